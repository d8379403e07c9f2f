//! Read-only user projection used by room and message queries

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub public_id: String,
    pub username: String,
}
