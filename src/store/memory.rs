//! In-memory store
//!
//! Backs the server when no database is configured, and the test suite.
//! Each table sits behind one `RwLock`, so every mutation holds the write lock
//! for its whole read-check-write sequence.

use super::{
    AchievementRepository, StudentRepository, UserCheck, UserRepository, ACHIEVEMENT_NOT_FOUND,
    ORDER_TAKEN, STUDENT_NOT_FOUND, USERNAME_TAKEN, USER_NOT_FOUND,
};
use crate::error::{duplicate_key_error, not_found_error, AppError};
use crate::models::{
    Achievement, AchievementChanges, NewAchievement, NewStudent, Student, StudentChanges,
};
use crate::users::{NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    /// username -> id
    by_username: HashMap<String, Uuid>,
}

impl UserTable {
    fn admin_count(&self) -> usize {
        self.by_id.values().filter(|u| u.role.is_admin()).count()
    }
}

/// Store keeping everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<UserTable>,
    achievements: RwLock<HashMap<Uuid, Achievement>>,
    students: RwLock<HashMap<Uuid, Student>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .by_username
            .get(username)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.by_id.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.username.cmp(&b.username)));
        Ok(all)
    }

    async fn count_admins(&self) -> Result<usize, AppError> {
        Ok(self.users.read().await.admin_count())
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users.by_username.contains_key(&user.username) {
            return Err(duplicate_key_error(USERNAME_TAKEN));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };

        users.by_username.insert(user.username.clone(), user.id);
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_checked(
        &self,
        id: Uuid,
        changes: UserChanges,
        check: UserCheck<'_>,
    ) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        let current = users
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error(USER_NOT_FOUND))?;

        check(&current, users.admin_count())?;

        if let Some(name) = &changes.username {
            if users.by_username.get(name).is_some_and(|owner| *owner != id) {
                return Err(duplicate_key_error(USERNAME_TAKEN));
            }
        }

        let mut updated = current.clone();
        if let Some(name) = changes.username {
            updated.username = name;
        }
        if let Some(hash) = changes.password_hash {
            updated.password_hash = hash;
        }
        if let Some(role) = changes.role {
            updated.role = role;
        }
        updated.updated_at = Utc::now();

        users.by_username.remove(&current.username);
        users.by_username.insert(updated.username.clone(), id);
        users.by_id.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_checked(&self, id: Uuid, check: UserCheck<'_>) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        let current = users
            .by_id
            .get(&id)
            .ok_or_else(|| not_found_error(USER_NOT_FOUND))?;

        check(current, users.admin_count())?;

        let removed = users
            .by_id
            .remove(&id)
            .ok_or_else(|| not_found_error(USER_NOT_FOUND))?;
        users.by_username.remove(&removed.username);
        Ok(removed)
    }
}

#[async_trait]
impl AchievementRepository for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Achievement>, AppError> {
        let achievements = self.achievements.read().await;
        let mut active: Vec<Achievement> =
            achievements.values().filter(|a| a.active).cloned().collect();
        active.sort_by_key(|a| a.order);
        Ok(active)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Achievement>, AppError> {
        Ok(self.achievements.read().await.get(&id).cloned())
    }

    async fn insert(&self, achievement: NewAchievement) -> Result<Achievement, AppError> {
        let mut achievements = self.achievements.write().await;
        if achievements.values().any(|a| a.order == achievement.order) {
            return Err(duplicate_key_error(ORDER_TAKEN));
        }

        let now = Utc::now();
        let achievement = Achievement {
            id: Uuid::new_v4(),
            title: achievement.title,
            description: achievement.description,
            order: achievement.order,
            active: true,
            created_at: now,
            updated_at: now,
        };
        achievements.insert(achievement.id, achievement.clone());
        Ok(achievement)
    }

    async fn update(&self, id: Uuid, changes: AchievementChanges) -> Result<Achievement, AppError> {
        let mut achievements = self.achievements.write().await;
        if !achievements.contains_key(&id) {
            return Err(not_found_error(ACHIEVEMENT_NOT_FOUND));
        }
        if let Some(order) = changes.order {
            if achievements.values().any(|a| a.order == order && a.id != id) {
                return Err(duplicate_key_error(ORDER_TAKEN));
            }
        }

        let achievement = achievements
            .get_mut(&id)
            .ok_or_else(|| not_found_error(ACHIEVEMENT_NOT_FOUND))?;
        if let Some(title) = changes.title {
            achievement.title = title;
        }
        if let Some(description) = changes.description {
            achievement.description = description;
        }
        if let Some(order) = changes.order {
            achievement.order = order;
        }
        if let Some(active) = changes.active {
            achievement.active = active;
        }
        achievement.updated_at = Utc::now();
        Ok(achievement.clone())
    }

    async fn deactivate(&self, id: Uuid) -> Result<Achievement, AppError> {
        let mut achievements = self.achievements.write().await;
        let achievement = achievements
            .get_mut(&id)
            .ok_or_else(|| not_found_error(ACHIEVEMENT_NOT_FOUND))?;
        achievement.active = false;
        achievement.updated_at = Utc::now();
        Ok(achievement.clone())
    }
}

#[async_trait]
impl StudentRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<Student>, AppError> {
        let students = self.students.read().await;
        let mut all: Vec<Student> = students.values().cloned().collect();
        all.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(all)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>, AppError> {
        Ok(self.students.read().await.get(&id).cloned())
    }

    async fn insert(&self, student: NewStudent) -> Result<Student, AppError> {
        let now = Utc::now();
        let student = Student {
            id: Uuid::new_v4(),
            full_name: student.full_name,
            curp: student.curp,
            grade: student.grade,
            group: student.group,
            guardian_name: student.guardian_name,
            phone: student.phone,
            email: student.email,
            created_at: now,
            updated_at: now,
        };
        self.students.write().await.insert(student.id, student.clone());
        Ok(student)
    }

    async fn update(&self, id: Uuid, changes: StudentChanges) -> Result<Student, AppError> {
        let mut students = self.students.write().await;
        let student = students
            .get_mut(&id)
            .ok_or_else(|| not_found_error(STUDENT_NOT_FOUND))?;

        if let Some(full_name) = changes.full_name {
            student.full_name = full_name;
        }
        if let Some(curp) = changes.curp {
            student.curp = curp;
        }
        if let Some(grade) = changes.grade {
            student.grade = grade;
        }
        if let Some(group) = changes.group {
            student.group = group;
        }
        if changes.guardian_name.is_some() {
            student.guardian_name = changes.guardian_name;
        }
        if changes.phone.is_some() {
            student.phone = changes.phone;
        }
        if changes.email.is_some() {
            student.email = changes.email;
        }
        student.updated_at = Utc::now();
        Ok(student.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<Student, AppError> {
        self.students
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| not_found_error(STUDENT_NOT_FOUND))
    }
}
