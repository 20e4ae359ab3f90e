use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scalar entry of the preference table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
