//! SQL query constants
//!
//! Contains all SQL queries used by the application.

/// Role enum shared by the users table. Idempotent.
pub const CREATE_ROLE_TYPE: &str = r#"
    DO $$ BEGIN
        CREATE TYPE staff_role AS ENUM ('admin', 'subdireccion', 'control_escolar');
    EXCEPTION
        WHEN duplicate_object THEN NULL;
    END $$
"#;

pub const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(64) UNIQUE NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        role staff_role NOT NULL DEFAULT 'control_escolar',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const CREATE_ACHIEVEMENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS achievements (
        id UUID PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        description TEXT NOT NULL,
        display_order INTEGER UNIQUE NOT NULL CHECK (display_order >= 1),
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const CREATE_STUDENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS students (
        id UUID PRIMARY KEY,
        full_name VARCHAR(200) NOT NULL,
        curp CHAR(18) NOT NULL,
        grade SMALLINT NOT NULL CHECK (grade BETWEEN 1 AND 3),
        group_name VARCHAR(10) NOT NULL,
        guardian_name VARCHAR(200),
        phone VARCHAR(20),
        email VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const CREATE_INDEXES: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_achievements_active_order ON achievements(active, display_order);
    CREATE INDEX IF NOT EXISTS idx_students_full_name ON students(full_name)
"#;

// ==================== Users ====================

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

pub fn select_user_by_id_for_update() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE")
}

pub fn select_user_by_username() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1")
}

pub fn list_users() -> String {
    format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, username")
}

pub fn insert_user() -> String {
    format!(
        "INSERT INTO users (id, username, password_hash, role, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $5) RETURNING {USER_COLUMNS}"
    )
}

pub fn update_user() -> String {
    format!(
        "UPDATE users SET \
            username = COALESCE($2, username), \
            password_hash = COALESCE($3, password_hash), \
            role = COALESCE($4, role), \
            updated_at = $5 \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    )
}

pub fn delete_user() -> String {
    format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}")
}

pub const COUNT_ADMINS: &str = "SELECT COUNT(*) FROM users WHERE role = 'admin'";

/// Row locks on every admin, held until the transaction ends.
/// Two concurrent guarded mutations serialize here.
pub const LOCK_ADMINS: &str = "SELECT id FROM users WHERE role = 'admin' ORDER BY id FOR UPDATE";

// ==================== Achievements ====================

const ACHIEVEMENT_COLUMNS: &str =
    "id, title, description, display_order, active, created_at, updated_at";

pub fn list_active_achievements() -> String {
    format!(
        "SELECT {ACHIEVEMENT_COLUMNS} FROM achievements WHERE active ORDER BY display_order"
    )
}

pub fn select_achievement_by_id() -> String {
    format!("SELECT {ACHIEVEMENT_COLUMNS} FROM achievements WHERE id = $1")
}

pub fn insert_achievement() -> String {
    format!(
        "INSERT INTO achievements (id, title, description, display_order, active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, TRUE, $5, $5) RETURNING {ACHIEVEMENT_COLUMNS}"
    )
}

pub fn update_achievement() -> String {
    format!(
        "UPDATE achievements SET \
            title = COALESCE($2, title), \
            description = COALESCE($3, description), \
            display_order = COALESCE($4, display_order), \
            active = COALESCE($5, active), \
            updated_at = $6 \
         WHERE id = $1 RETURNING {ACHIEVEMENT_COLUMNS}"
    )
}

pub fn deactivate_achievement() -> String {
    format!(
        "UPDATE achievements SET active = FALSE, updated_at = $2 \
         WHERE id = $1 RETURNING {ACHIEVEMENT_COLUMNS}"
    )
}

// ==================== Students ====================

const STUDENT_COLUMNS: &str = "id, full_name, curp, grade, group_name, guardian_name, phone, email, created_at, updated_at";

pub fn list_students() -> String {
    format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY full_name")
}

pub fn select_student_by_id() -> String {
    format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1")
}

pub fn insert_student() -> String {
    format!(
        "INSERT INTO students (id, full_name, curp, grade, group_name, guardian_name, phone, email, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) RETURNING {STUDENT_COLUMNS}"
    )
}

pub fn update_student() -> String {
    format!(
        "UPDATE students SET \
            full_name = COALESCE($2, full_name), \
            curp = COALESCE($3, curp), \
            grade = COALESCE($4, grade), \
            group_name = COALESCE($5, group_name), \
            guardian_name = COALESCE($6, guardian_name), \
            phone = COALESCE($7, phone), \
            email = COALESCE($8, email), \
            updated_at = $9 \
         WHERE id = $1 RETURNING {STUDENT_COLUMNS}"
    )
}

pub fn delete_student() -> String {
    format!("DELETE FROM students WHERE id = $1 RETURNING {STUDENT_COLUMNS}")
}
