use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Account role. The numeric value is what gets stored and carried in token claims.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Teacher = 1,
    Student = 2,
    Parent = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Teacher),
            2 => Some(Role::Student),
            3 => Some(Role::Parent),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}
