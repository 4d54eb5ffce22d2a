use serde::{Deserialize, Serialize};

/// Public profile fields of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserProfile {
    /// Profile without contact details that only conversation members see
    pub fn public(mut self) -> Self {
        self.phone = None;
        self
    }
}

/// Summary of a job posting used to label conversations and notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_profile_hides_phone() {
        let profile = UserProfile {
            id: "u1".into(),
            full_name: "Alice".into(),
            avatar: None,
            email: Some("alice@example.com".into()),
            phone: Some("0987654321".into()),
        };

        let json = serde_json::to_value(profile.public()).unwrap();
        assert!(json.get("phone").is_none());
        assert_eq!(json["fullName"], "Alice");
    }
}
