//! Room entity definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomVisibility {
    Public,
    Private,
}

impl RoomVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomVisibility::Public => "public",
            RoomVisibility::Private => "private",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, RoomVisibility::Public)
    }
}

impl FromStr for RoomVisibility {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(RoomVisibility::Public),
            "private" => Ok(RoomVisibility::Private),
            other => Err(DatabaseError::InvalidData(format!(
                "unknown room visibility {other}"
            ))),
        }
    }
}

impl fmt::Display for RoomVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A room row joined with its creator and current member count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: i64,
    pub public_id: String,
    pub name: String,
    pub visibility: RoomVisibility,
    pub created_by: i64,
    pub creator_username: String,
    pub member_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub visibility: RoomVisibility,
    pub created_by: i64,
}
