use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Role names the backend may add later are kept verbatim in `Other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    Admin,
    User,
    Other(String),
}

impl From<String> for UserRole {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ADMIN" => Self::Admin,
            "USER" => Self::User,
            _ => Self::Other(raw),
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => "ADMIN".to_string(),
            UserRole::User => "USER".to_string(),
            UserRole::Other(raw) => raw,
        }
    }
}

/// Profile of the authenticated identity as returned by `GET me`.
///
/// Fields the session core does not interpret are kept in `extra`, so equality between two
/// snapshots covers the whole object the backend sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Credential persisted by the token store. `expires_at` is in epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialToken {
    pub access_token: String,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub tables_count: u64,
    #[serde(default)]
    pub flows_count: u64,
    #[serde(default)]
    pub models_count: u64,
    #[serde(default)]
    pub binary_datasets_count: u64,
    #[serde(default)]
    pub pipelines_count: u64,
    #[serde(default)]
    pub projects_count: u64,
    #[serde(default)]
    pub cv_models_count: u64,
    #[serde(default)]
    pub cv_predictions_count: u64,
    #[serde(default)]
    pub tabular_predictions_count: u64,
    #[serde(default)]
    pub s9_projects_count: u64,
    #[serde(default)]
    pub albums_count: u64,
    #[serde(default)]
    pub experiments_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpProfile {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfirmationRequest {
    pub org_id: String,
    pub user_id: String,
    pub activation_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetCompletion {
    pub email: String,
    pub secret_code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EmailOnly<'a> {
    pub email: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_keeps_unknown_fields_for_equality() {
        let a: User = serde_json::from_value(json!({
            "id": "u1",
            "firstName": "A",
            "lastName": "B",
            "email": "a@b.com",
            "role": "USER",
            "status": "ACTIVE",
        }))
        .unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);

        b.extra.insert("status".to_string(), json!("DEACTIVATED"));
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_roles_are_kept_verbatim() {
        let with_role = |role: &str| -> User {
            serde_json::from_value(json!({
                "id": "u1",
                "firstName": "A",
                "lastName": "B",
                "email": "a@b.com",
                "role": role,
            }))
            .unwrap()
        };

        let supervisor = with_role("SUPERVISOR");
        assert_eq!(supervisor.role, UserRole::Other("SUPERVISOR".to_string()));
        assert_eq!(supervisor.display_name(), "A B");
        assert_ne!(supervisor, with_role("MANAGER"));
        assert_eq!(with_role("ADMIN").role, UserRole::Admin);

        let value = serde_json::to_value(&supervisor).unwrap();
        assert_eq!(value["role"], json!("SUPERVISOR"));
        assert_eq!(serde_json::to_value(&with_role("USER")).unwrap()["role"], json!("USER"));
    }

    #[test]
    fn stats_default_missing_counters_to_zero() {
        let stats: UserStats =
            serde_json::from_value(json!({ "tablesCount": 3, "flowsCount": 1 })).unwrap();
        assert_eq!(stats.tables_count, 3);
        assert_eq!(stats.flows_count, 1);
        assert_eq!(stats.albums_count, 0);
    }

    #[test]
    fn sign_in_credentials_skip_missing_identifiers() {
        let value = serde_json::to_value(SignInCredentials {
            username: Some("ayush".to_string()),
            email: None,
            password: "test".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({ "username": "ayush", "password": "test" }));
    }
}
