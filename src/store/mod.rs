//! Persistence layer
//!
//! Repository traits for users, achievements and students, with an in-memory
//! implementation and a PostgreSQL one. Handlers and services only see the
//! traits.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::AppError;
use crate::models::{
    Achievement, AchievementChanges, NewAchievement, NewStudent, Student, StudentChanges,
};
use crate::users::{NewUser, User, UserChanges};
use async_trait::async_trait;
use uuid::Uuid;

/// Policy check run by a store inside its critical section.
///
/// Receives the current target record and the number of admins observed in
/// that same section.
pub type UserCheck<'a> = &'a (dyn Fn(&User, usize) -> Result<(), AppError> + Send + Sync);

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// All users, oldest first
    async fn list(&self) -> Result<Vec<User>, AppError>;

    async fn count_admins(&self) -> Result<usize, AppError>;

    /// Insert a user. `DuplicateKey` when the username is taken.
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    /// Apply `changes` to user `id` if `check` approves.
    ///
    /// The lookup, the admin count, the check and the write happen atomically.
    async fn update_checked(
        &self,
        id: Uuid,
        changes: UserChanges,
        check: UserCheck<'_>,
    ) -> Result<User, AppError>;

    /// Delete user `id` if `check` approves, returning the removed record.
    async fn delete_checked(&self, id: Uuid, check: UserCheck<'_>) -> Result<User, AppError>;
}

#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// Active achievements by ascending order
    async fn list_active(&self) -> Result<Vec<Achievement>, AppError>;

    /// Lookup regardless of the active flag
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Achievement>, AppError>;

    /// `DuplicateKey` when the order is already used, active or not
    async fn insert(&self, achievement: NewAchievement) -> Result<Achievement, AppError>;

    async fn update(&self, id: Uuid, changes: AchievementChanges) -> Result<Achievement, AppError>;

    /// Soft delete: clears the active flag
    async fn deactivate(&self, id: Uuid) -> Result<Achievement, AppError>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// All students ordered by full name
    async fn list(&self) -> Result<Vec<Student>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>, AppError>;

    async fn insert(&self, student: NewStudent) -> Result<Student, AppError>;

    async fn update(&self, id: Uuid, changes: StudentChanges) -> Result<Student, AppError>;

    async fn delete(&self, id: Uuid) -> Result<Student, AppError>;
}

pub(crate) const USER_NOT_FOUND: &str = "User not found";
pub(crate) const USERNAME_TAKEN: &str = "Username already exists";
pub(crate) const ACHIEVEMENT_NOT_FOUND: &str = "Achievement not found";
pub(crate) const ORDER_TAKEN: &str = "An achievement with that order already exists";
pub(crate) const STUDENT_NOT_FOUND: &str = "Student not found";
