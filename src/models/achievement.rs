//! Achievement (logro) models
//!
//! Achievements are shown on the public site in `order`. They are never hard
//! deleted; deactivation hides them from listings.

use super::not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Stored achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub order: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAchievement {
    pub title: String,
    pub description: String,
    pub order: i32,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct AchievementChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
    pub active: Option<bool>,
}

/// Request to create an achievement
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAchievementRequest {
    #[serde(alias = "titulo")]
    #[validate(length(min = 1, max = 200, message = "Title is required"), custom(function = "not_blank"))]
    pub title: String,
    #[serde(alias = "descripcion")]
    #[validate(length(min = 1, message = "Description is required"), custom(function = "not_blank"))]
    pub description: String,
    #[serde(alias = "orden")]
    #[validate(range(min = 1, message = "Order must be at least 1"))]
    pub order: i32,
}

impl CreateAchievementRequest {
    pub fn into_new(self) -> NewAchievement {
        NewAchievement {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            order: self.order,
        }
    }
}

/// Request to update an achievement
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAchievementRequest {
    #[serde(alias = "titulo")]
    #[validate(length(min = 1, max = 200, message = "Title cannot be empty"), custom(function = "not_blank"))]
    pub title: Option<String>,
    #[serde(alias = "descripcion")]
    #[validate(length(min = 1, message = "Description cannot be empty"), custom(function = "not_blank"))]
    pub description: Option<String>,
    #[serde(alias = "orden")]
    #[validate(range(min = 1, message = "Order must be at least 1"))]
    pub order: Option<i32>,
    #[serde(alias = "activo")]
    pub active: Option<bool>,
}

impl UpdateAchievementRequest {
    pub fn into_changes(self) -> AchievementChanges {
        AchievementChanges {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description.map(|d| d.trim().to_string()),
            order: self.order,
            active: self.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_accepts_spanish_field_names() {
        let req: CreateAchievementRequest =
            serde_json::from_str(r#"{"titulo":"Primer lugar","descripcion":"Olimpiada","orden":1}"#)
                .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.order, 1);
    }

    #[test]
    fn test_create_request_rules() {
        let zero: CreateAchievementRequest =
            serde_json::from_str(r#"{"title":"t","description":"d","order":0}"#).unwrap();
        assert!(zero.validate().is_err());

        let empty: CreateAchievementRequest =
            serde_json::from_str(r#"{"title":"","description":"d","order":2}"#).unwrap();
        assert!(empty.validate().is_err());

        let blank: CreateAchievementRequest =
            serde_json::from_str(r#"{"title":"   ","description":" ","order":2}"#).unwrap();
        assert!(blank.validate().is_err());

        let missing = serde_json::from_str::<CreateAchievementRequest>(r#"{"title":"t"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_update_request_checks_only_present_fields() {
        let req: UpdateAchievementRequest = serde_json::from_str(r#"{"activo":true}"#).unwrap();
        assert!(req.validate().is_ok());

        let bad: UpdateAchievementRequest = serde_json::from_str(r#"{"order":-3}"#).unwrap();
        assert!(bad.validate().is_err());

        let blank: UpdateAchievementRequest = serde_json::from_str(r#"{"titulo":"  "}"#).unwrap();
        assert!(blank.validate().is_err());
    }
}
