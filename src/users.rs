//! User management module
//!
//! Staff account model and the service that creates, updates, deletes and
//! logs in users. Mutations that touch roles go through [`AdminGuard`], which
//! the store evaluates atomically with the write.

use crate::auth::{AdminGuard, Identity, PasswordHasher, Role, TokenService};
use crate::error::{validation_error, AppError};
use crate::store::UserRepository;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

/// bcrypt ignores anything past 72 bytes, so longer passwords are refused.
const MAX_PASSWORD_BYTES: usize = 72;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._@-]{1,64}$").expect("valid username regex"));

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)] // Never send password hash to client
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User response (without sensitive data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// New user record, already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Field changes for an existing user; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    if !USERNAME_RE.is_match(username) {
        let mut err = validator::ValidationError::new("invalid_username");
        err.message = Some(
            "Username must be 1-64 characters of letters, digits, '.', '_', '@' or '-'".into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Request to create a staff account
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 1, max = 72, message = "Password must be between 1 and 72 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Request to update a staff account
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 72, message = "Password must be between 1 and 72 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Orchestrates staff account operations
pub struct UserService {
    store: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    tokens: TokenService,
    /// Hash checked against when the username does not exist, so both
    /// login failure paths do the same work.
    decoy_hash: tokio::sync::OnceCell<String>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserRepository>, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self {
            store,
            hasher,
            tokens,
            decoy_hash: tokio::sync::OnceCell::new(),
        }
    }

    /// List all users, hashes omitted
    pub async fn list_users(&self) -> Result<Vec<UserResponse>, AppError> {
        let users = self.store.list().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Create a new staff account
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<UserResponse, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(validation_error("Username is required"));
        }
        validate_username(username).map_err(|_| validation_error("Invalid username format"))?;
        check_password(password)?;

        let password_hash = self.hash(password).await?;
        let user = self
            .store
            .insert(NewUser {
                username: username.to_string(),
                password_hash,
                role,
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");
        Ok(user.into())
    }

    /// Update an existing account on behalf of `actor`
    pub async fn update_user(
        &self,
        actor: &Identity,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, AppError> {
        let username = match request.username {
            Some(name) => {
                let name = name.trim().to_string();
                validate_username(&name).map_err(|_| validation_error("Invalid username format"))?;
                Some(name)
            }
            None => None,
        };

        // Hash before entering the store's critical section.
        let password_hash = match request.password.as_deref() {
            Some(password) => {
                check_password(password)?;
                Some(self.hash(password).await?)
            }
            None => None,
        };

        let changes = UserChanges {
            username,
            password_hash,
            role: request.role,
        };

        let guard = AdminGuard::for_actor(actor.user_id);
        let requested_role = changes.role;
        let user = self
            .store
            .update_checked(id, changes, &move |target: &User, admins: usize| {
                guard.check_update(target, requested_role, admins)
            })
            .await?;

        info!(actor = %actor.user_id, user_id = %user.id, role = %user.role, "User updated");
        Ok(user.into())
    }

    /// Delete an account on behalf of `actor`
    pub async fn delete_user(&self, actor: &Identity, id: Uuid) -> Result<String, AppError> {
        let guard = AdminGuard::for_actor(actor.user_id);
        let deleted = self
            .store
            .delete_checked(id, &move |target: &User, admins: usize| {
                guard.check_delete(target, admins)
            })
            .await?;

        info!(actor = %actor.user_id, user_id = %deleted.id, username = %deleted.username, "User deleted");
        Ok(format!("User '{}' deleted successfully", deleted.username))
    }

    /// Authenticate with username and password and issue a session token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AppError> {
        let user = self.store.find_by_username(username.trim()).await?;

        let Some(user) = user else {
            let decoy = self.decoy_hash().await?;
            let _ = self.verify(password, decoy).await;
            debug!(username = %username, "Login failed: unknown username");
            return Err(AppError::InvalidCredentials);
        };

        if !self.verify(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "Login failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id, &user.username, user.role)?;
        info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl_seconds(),
            user: user.into(),
        })
    }

    /// Create the first admin when the store has none.
    ///
    /// Returns the created account, or `None` when an admin already exists.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserResponse>, AppError> {
        if self.store.count_admins().await? > 0 {
            debug!("Admin account already present, skipping bootstrap");
            return Ok(None);
        }

        let admin = self.create_user(username, password, Role::Admin).await?;
        info!(user_id = %admin.id, username = %admin.username, "Bootstrap admin created");
        Ok(Some(admin))
    }

    /// Number of admin accounts currently stored
    pub async fn admin_count(&self) -> Result<usize, AppError> {
        self.store.count_admins().await
    }

    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let hasher = self.hasher;
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }

    async fn decoy_hash(&self) -> Result<&str, AppError> {
        self.decoy_hash
            .get_or_try_init(|| async {
                let seed = Uuid::new_v4().to_string();
                self.hash(&seed).await
            })
            .await
            .map(String::as_str)
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(validation_error("Password is required"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(validation_error("Password must be at most 72 bytes"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    fn service() -> (UserService, TokenService) {
        let tokens = TokenService::new(b"user-service-test-secret", 24);
        let store = Arc::new(MemoryStore::new());
        (
            UserService::new(store, PasswordHasher::new(4), tokens.clone()),
            tokens,
        )
    }

    fn identity_of(user: &UserResponse) -> Identity {
        Identity {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }

    #[tokio::test]
    async fn test_create_then_login_issues_matching_token() {
        let (service, tokens) = service();
        for (name, role) in [
            ("root", Role::Admin),
            ("subdir", Role::Subdireccion),
            ("control", Role::ControlEscolar),
        ] {
            service.create_user(name, "pa55word", role).await.unwrap();
            let login = service.login(name, "pa55word").await.unwrap();

            let claims = tokens.verify(&login.token).unwrap();
            assert_eq!(claims.username, name);
            assert_eq!(claims.role, role);
            assert_eq!(login.user.username, name);
            assert_eq!(login.expires_in, 24 * 3600);
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_empty_fields() {
        let (service, _) = service();
        assert_ok!(service.create_user("maria", "secret", Role::Subdireccion).await);

        let dup = service.create_user("maria", "other", Role::Admin).await;
        assert!(matches!(dup, Err(AppError::DuplicateKey(_))));

        assert!(matches!(service.create_user("  ", "x", Role::Admin).await, Err(AppError::Validation(_))));
        assert!(matches!(service.create_user("juan", "", Role::Admin).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_failures_are_identical() {
        let (service, _) = service();
        service.create_user("maria", "secret", Role::Admin).await.unwrap();

        let unknown = service.login("nobody", "secret").await.unwrap_err();
        let wrong = service.login("maria", "not-it").await.unwrap_err();

        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_decoy_hash_is_built_once_at_configured_cost() {
        let (service, _) = service();
        assert!(service.decoy_hash.get().is_none());

        assert!(service.login("nobody", "secret").await.is_err());
        let first = service.decoy_hash.get().cloned().unwrap();
        assert!(first.starts_with("$2b$04$"));

        assert!(service.login("nadie", "secret").await.is_err());
        assert_eq!(service.decoy_hash.get(), Some(&first));
    }

    #[tokio::test]
    async fn test_sole_admin_cannot_be_deleted_or_demoted() {
        let (service, _) = service();
        let admin = service.create_user("root", "secret", Role::Admin).await.unwrap();
        // An outside actor (e.g. a token for an account that was since removed).
        let outsider = Identity {
            user_id: Uuid::new_v4(),
            username: "ghost".to_string(),
            role: Role::Admin,
        };

        let deleted = service.delete_user(&outsider, admin.id).await;
        assert!(matches!(deleted, Err(AppError::PolicyViolation(_))));

        let demoted = service
            .update_user(
                &outsider,
                admin.id,
                UpdateUserRequest {
                    role: Some(Role::ControlEscolar),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(demoted, Err(AppError::PolicyViolation(_))));
        assert_eq!(service.admin_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_or_demote_self() {
        let (service, _) = service();
        let a = service.create_user("a", "secret", Role::Admin).await.unwrap();
        service.create_user("b", "secret", Role::Admin).await.unwrap();
        let me = identity_of(&a);

        assert!(matches!(service.delete_user(&me, a.id).await, Err(AppError::PolicyViolation(_))));

        let demote = UpdateUserRequest {
            role: Some(Role::Subdireccion),
            ..Default::default()
        };
        assert!(matches!(
            service.update_user(&me, a.id, demote).await,
            Err(AppError::PolicyViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_can_demote_and_delete_another_admin() {
        let (service, _) = service();
        let a = service.create_user("a", "secret", Role::Admin).await.unwrap();
        let b = service.create_user("b", "secret", Role::Admin).await.unwrap();
        let me = identity_of(&a);

        let updated = service
            .update_user(
                &me,
                b.id,
                UpdateUserRequest {
                    role: Some(Role::Subdireccion),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Subdireccion);

        assert_ok!(service.delete_user(&me, b.id).await);
        assert_eq!(service.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rehashes_only_when_password_given() {
        let (service, _) = service();
        let a = service.create_user("a", "secret", Role::Admin).await.unwrap();
        let u = service.create_user("u", "first", Role::ControlEscolar).await.unwrap();
        let me = identity_of(&a);

        service
            .update_user(
                &me,
                u.id,
                UpdateUserRequest {
                    username: Some("u2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_ok!(service.login("u2", "first").await);

        service
            .update_user(
                &me,
                u.id,
                UpdateUserRequest {
                    password: Some("second".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_err!(service.login("u2", "first").await);
        assert_ok!(service.login("u2", "second").await);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_user_is_not_found() {
        let (service, _) = service();
        let a = service.create_user("a", "secret", Role::Admin).await.unwrap();
        let me = identity_of(&a);
        let missing = Uuid::new_v4();

        assert!(matches!(
            service.update_user(&me, missing, UpdateUserRequest::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(service.delete_user(&me, missing).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_onto_existing_username_is_duplicate() {
        let (service, _) = service();
        let a = service.create_user("a", "secret", Role::Admin).await.unwrap();
        let b = service.create_user("b", "secret", Role::Subdireccion).await.unwrap();

        let result = service
            .update_user(
                &identity_of(&a),
                b.id,
                UpdateUserRequest {
                    username: Some("a".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_runs_once() {
        let (service, _) = service();
        assert!(service.bootstrap_admin("root", "secret").await.unwrap().is_some());
        assert!(service.bootstrap_admin("root2", "secret").await.unwrap().is_none());
        assert_eq!(service.admin_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_keep_one_admin() {
        let (service, _) = service();
        let service = Arc::new(service);
        let a = service.create_user("a", "secret", Role::Admin).await.unwrap();
        let b = service.create_user("b", "secret", Role::Admin).await.unwrap();
        let outsider = Identity {
            user_id: Uuid::new_v4(),
            username: "ghost".to_string(),
            role: Role::Admin,
        };

        let (s1, s2) = (service.clone(), service.clone());
        let (o1, o2) = (outsider.clone(), outsider.clone());
        let first = tokio::spawn(async move { s1.delete_user(&o1, a.id).await });
        let second = tokio::spawn(async move { s2.delete_user(&o2, b.id).await });

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(service.admin_count().await.unwrap(), 1);
    }

    #[test]
    fn test_user_serialization_never_includes_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "root".to_string(),
            password_hash: "$2b$04$secret-hash".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("passwordHash"));
        assert!(!json.contains("secret-hash"));

        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
