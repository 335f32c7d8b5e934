//! Admin-invariant guard
//!
//! Keeps the store from ever reaching a state with zero admin accounts and
//! stops an admin from removing their own authority.
//!
//! The guard only decides. Stores call it from inside the same critical
//! section that performs the write, handing it the current target record and
//! the admin count observed there, so count-and-act is one logical step.

use crate::auth::Role;
use crate::error::AppError;
use crate::users::User;
use tracing::warn;
use uuid::Uuid;

/// Policy checks for user mutations, bound to the acting admin
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard {
    actor_id: Uuid,
}

impl AdminGuard {
    pub fn for_actor(actor_id: Uuid) -> Self {
        Self { actor_id }
    }

    /// Check an update that may change `target`'s role.
    ///
    /// `requested_role` is the role from the update payload, if any.
    pub fn check_update(
        &self,
        target: &User,
        requested_role: Option<Role>,
        admin_count: usize,
    ) -> Result<(), AppError> {
        let demoting = matches!(requested_role, Some(role) if target.role.is_admin() && !role.is_admin());
        if !demoting {
            return Ok(());
        }

        if target.id == self.actor_id {
            warn!(actor = %self.actor_id, "Admin attempted to remove their own admin role");
            return Err(AppError::PolicyViolation(
                "You cannot remove the admin role from your own account".to_string(),
            ));
        }

        if admin_count <= 1 {
            warn!(actor = %self.actor_id, target = %target.id, "Attempt to demote the last admin");
            return Err(AppError::PolicyViolation(
                "Cannot change the role of the last remaining admin".to_string(),
            ));
        }

        Ok(())
    }

    /// Check a deletion of `target`
    pub fn check_delete(&self, target: &User, admin_count: usize) -> Result<(), AppError> {
        if target.id == self.actor_id {
            warn!(actor = %self.actor_id, "Admin attempted to delete their own account");
            return Err(AppError::PolicyViolation(
                "You cannot delete your own account".to_string(),
            ));
        }

        if target.role.is_admin() && admin_count <= 1 {
            warn!(actor = %self.actor_id, target = %target.id, "Attempt to delete the last admin");
            return Err(AppError::PolicyViolation(
                "Cannot delete the last remaining admin".to_string(),
            ));
        }

        Ok(())
    }
}
