//! Student (alumno) models

use super::{not_blank, trimmed};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

static CURP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{18}$").expect("valid CURP regex"));

fn validate_curp(curp: &str) -> Result<(), ValidationError> {
    if !CURP_RE.is_match(curp) {
        let mut err = ValidationError::new("invalid_curp");
        err.message = Some("CURP must be 18 letters or digits".into());
        return Err(err);
    }
    Ok(())
}

/// Stored student record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub curp: String,
    pub grade: i16,
    pub group: String,
    pub guardian_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub full_name: String,
    pub curp: String,
    pub grade: i16,
    pub group: String,
    pub guardian_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct StudentChanges {
    pub full_name: Option<String>,
    pub curp: Option<String>,
    pub grade: Option<i16>,
    pub group: Option<String>,
    pub guardian_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 200, message = "Full name is required"), custom(function = "not_blank"))]
    pub full_name: String,
    #[validate(custom(function = "validate_curp"))]
    pub curp: String,
    #[validate(range(min = 1, max = 3, message = "Grade must be between 1 and 3"))]
    pub grade: i16,
    #[validate(length(min = 1, max = 10, message = "Group is required"), custom(function = "not_blank"))]
    pub group: String,
    pub guardian_name: Option<String>,
    #[validate(length(max = 20, message = "Phone is too long"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl CreateStudentRequest {
    pub fn into_new(self) -> NewStudent {
        NewStudent {
            full_name: self.full_name.trim().to_string(),
            curp: self.curp.to_uppercase(),
            grade: self.grade,
            group: self.group.trim().to_uppercase(),
            guardian_name: trimmed(self.guardian_name),
            phone: trimmed(self.phone),
            email: trimmed(self.email),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 200, message = "Full name cannot be empty"), custom(function = "not_blank"))]
    pub full_name: Option<String>,
    #[validate(custom(function = "validate_curp"))]
    pub curp: Option<String>,
    #[validate(range(min = 1, max = 3, message = "Grade must be between 1 and 3"))]
    pub grade: Option<i16>,
    #[validate(length(min = 1, max = 10, message = "Group cannot be empty"), custom(function = "not_blank"))]
    pub group: Option<String>,
    pub guardian_name: Option<String>,
    #[validate(length(max = 20, message = "Phone is too long"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl UpdateStudentRequest {
    pub fn into_changes(self) -> StudentChanges {
        StudentChanges {
            full_name: self.full_name.map(|n| n.trim().to_string()),
            curp: self.curp.map(|c| c.to_uppercase()),
            grade: self.grade,
            group: self.group.map(|g| g.trim().to_uppercase()),
            guardian_name: trimmed(self.guardian_name),
            phone: trimmed(self.phone),
            email: trimmed(self.email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreateStudentRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_student_normalizes_curp_and_group() {
        let req = request(
            r#"{"fullName":" Ana López ","curp":"lopa080101mdfxxx09","grade":2,"group":"b"}"#,
        );
        assert!(req.validate().is_ok());

        let new = req.into_new();
        assert_eq!(new.full_name, "Ana López");
        assert_eq!(new.curp, "LOPA080101MDFXXX09");
        assert_eq!(new.group, "B");
        assert_eq!(new.email, None);
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let short_curp = request(r#"{"fullName":"A","curp":"ABC","grade":1,"group":"A"}"#);
        assert!(short_curp.validate().is_err());

        let grade = request(r#"{"fullName":"A","curp":"LOPA080101MDFXXX09","grade":4,"group":"A"}"#);
        assert!(grade.validate().is_err());

        let email = request(
            r#"{"fullName":"A","curp":"LOPA080101MDFXXX09","grade":1,"group":"A","email":"nope"}"#,
        );
        assert!(email.validate().is_err());

        let blank = request(r#"{"fullName":"   ","curp":"LOPA080101MDFXXX09","grade":1,"group":" "}"#);
        assert!(blank.validate().is_err());

        let blank_update: UpdateStudentRequest = serde_json::from_str(r#"{"group":"  "}"#).unwrap();
        assert!(blank_update.validate().is_err());
    }
}
