//! PostgreSQL store
//!
//! Guarded user mutations run in a transaction that first locks every admin
//! row, then the target row. Concurrent demotions or deletions of admins queue
//! on those locks, so the admin count a check sees stays true until commit.

use super::{
    AchievementRepository, StudentRepository, UserCheck, UserRepository, ACHIEVEMENT_NOT_FOUND,
    ORDER_TAKEN, STUDENT_NOT_FOUND, USERNAME_TAKEN, USER_NOT_FOUND,
};
use crate::db::queries;
use crate::error::{duplicate_key_error, not_found_error, AppError};
use crate::models::{
    Achievement, AchievementChanges, NewAchievement, NewStudent, Student, StudentChanges,
};
use crate::users::{NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::debug;
use uuid::Uuid;

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn achievement_from_row(row: &Row) -> Achievement {
    Achievement {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        order: row.get("display_order"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn student_from_row(row: &Row) -> Student {
    Student {
        id: row.get("id"),
        full_name: row.get("full_name"),
        curp: row.get("curp"),
        grade: row.get("grade"),
        group: row.get("group_name"),
        guardian_name: row.get("guardian_name"),
        phone: row.get("phone"),
        email: row.get("email"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a unique-constraint violation to `DuplicateKey`, anything else passes through
fn unique_violation(message: &'static str) -> impl Fn(tokio_postgres::Error) -> AppError {
    move |e| {
        if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            debug!("Unique constraint rejected write: {}", e);
            duplicate_key_error(message)
        } else {
            AppError::Database(e)
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::select_user_by_username().as_str(), &[&username])
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::list_users().as_str(), &[]).await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn count_admins(&self) -> Result<usize, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_one(queries::COUNT_ADMINS, &[]).await?;
        let count: i64 = row.get(0);
        Ok(count as usize)
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                queries::insert_user().as_str(),
                &[
                    &Uuid::new_v4(),
                    &user.username,
                    &user.password_hash,
                    &user.role,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(unique_violation(USERNAME_TAKEN))?;
        Ok(user_from_row(&row))
    }

    async fn update_checked(
        &self,
        id: Uuid,
        changes: UserChanges,
        check: UserCheck<'_>,
    ) -> Result<User, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let admins = tx.query(queries::LOCK_ADMINS, &[]).await?;
        let current = tx
            .query_opt(queries::select_user_by_id_for_update().as_str(), &[&id])
            .await?
            .map(|row| user_from_row(&row))
            .ok_or_else(|| not_found_error(USER_NOT_FOUND))?;

        // Dropping `tx` on error rolls back and releases the locks.
        check(&current, admins.len())?;

        let row = tx
            .query_one(
                queries::update_user().as_str(),
                &[
                    &id,
                    &changes.username,
                    &changes.password_hash,
                    &changes.role,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(unique_violation(USERNAME_TAKEN))?;
        tx.commit().await?;

        Ok(user_from_row(&row))
    }

    async fn delete_checked(&self, id: Uuid, check: UserCheck<'_>) -> Result<User, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let admins = tx.query(queries::LOCK_ADMINS, &[]).await?;
        let current = tx
            .query_opt(queries::select_user_by_id_for_update().as_str(), &[&id])
            .await?
            .map(|row| user_from_row(&row))
            .ok_or_else(|| not_found_error(USER_NOT_FOUND))?;

        check(&current, admins.len())?;

        let row = tx.query_one(queries::delete_user().as_str(), &[&id]).await?;
        tx.commit().await?;

        Ok(user_from_row(&row))
    }
}

#[async_trait]
impl AchievementRepository for PgStore {
    async fn list_active(&self) -> Result<Vec<Achievement>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::list_active_achievements().as_str(), &[]).await?;
        Ok(rows.iter().map(achievement_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Achievement>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::select_achievement_by_id().as_str(), &[&id])
            .await?;
        Ok(row.as_ref().map(achievement_from_row))
    }

    async fn insert(&self, achievement: NewAchievement) -> Result<Achievement, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                queries::insert_achievement().as_str(),
                &[
                    &Uuid::new_v4(),
                    &achievement.title,
                    &achievement.description,
                    &achievement.order,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(unique_violation(ORDER_TAKEN))?;
        Ok(achievement_from_row(&row))
    }

    async fn update(&self, id: Uuid, changes: AchievementChanges) -> Result<Achievement, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                queries::update_achievement().as_str(),
                &[
                    &id,
                    &changes.title,
                    &changes.description,
                    &changes.order,
                    &changes.active,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(unique_violation(ORDER_TAKEN))?
            .ok_or_else(|| not_found_error(ACHIEVEMENT_NOT_FOUND))?;
        Ok(achievement_from_row(&row))
    }

    async fn deactivate(&self, id: Uuid) -> Result<Achievement, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::deactivate_achievement().as_str(), &[&id, &Utc::now()])
            .await?
            .ok_or_else(|| not_found_error(ACHIEVEMENT_NOT_FOUND))?;
        Ok(achievement_from_row(&row))
    }
}

#[async_trait]
impl StudentRepository for PgStore {
    async fn list(&self) -> Result<Vec<Student>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::list_students().as_str(), &[]).await?;
        Ok(rows.iter().map(student_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::select_student_by_id().as_str(), &[&id]).await?;
        Ok(row.as_ref().map(student_from_row))
    }

    async fn insert(&self, student: NewStudent) -> Result<Student, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                queries::insert_student().as_str(),
                &[
                    &Uuid::new_v4(),
                    &student.full_name,
                    &student.curp,
                    &student.grade,
                    &student.group,
                    &student.guardian_name,
                    &student.phone,
                    &student.email,
                    &Utc::now(),
                ],
            )
            .await?;
        Ok(student_from_row(&row))
    }

    async fn update(&self, id: Uuid, changes: StudentChanges) -> Result<Student, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                queries::update_student().as_str(),
                &[
                    &id,
                    &changes.full_name,
                    &changes.curp,
                    &changes.grade,
                    &changes.group,
                    &changes.guardian_name,
                    &changes.phone,
                    &changes.email,
                    &Utc::now(),
                ],
            )
            .await?
            .ok_or_else(|| not_found_error(STUDENT_NOT_FOUND))?;
        Ok(student_from_row(&row))
    }

    async fn delete(&self, id: Uuid) -> Result<Student, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::delete_student().as_str(), &[&id])
            .await?
            .ok_or_else(|| not_found_error(STUDENT_NOT_FOUND))?;
        Ok(student_from_row(&row))
    }
}
