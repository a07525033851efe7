use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub(crate) struct NewUserData {
    pub(crate) name: String,
    pub(crate) email: String,
}

/// Partial update. Absent fields keep their stored value. `user_id` and
/// `created_at` are accepted only when they echo the stored value.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpdateUserData {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) user_id: Option<Uuid>,
    #[serde(default)]
    pub(crate) created_at: Option<DateTime<Utc>>,
}
