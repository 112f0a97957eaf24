//! The minimal user principal backing sessions and foreign keys.
//!
//! User lifecycle (sign-up, OAuth) is owned by the external auth
//! collaborator; this record only anchors ownership of accounts, keys,
//! usage, and disabled models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: Option<String>,
}
