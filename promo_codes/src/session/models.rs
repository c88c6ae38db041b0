//! Session data models.

use crate::oauth::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login session, stored at `user_session:{session_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Provider bearer token, stored in clear text
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl Session {
    /// Profile snapshot taken at login time
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id.clone(),
            username: self.username.clone(),
            name: self.display_name.clone(),
            profile_image_url: self.avatar_url.clone(),
        }
    }
}
