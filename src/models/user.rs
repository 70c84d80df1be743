use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schema::{ColumnSpec, EntityDescriptor};
use super::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Password hash as produced by the auth layer.
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
}

impl Entity for User {
    const TABLE: &'static str = "user";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::TABLE)
            .column(ColumnSpec::integer("id").autoincrement())
            .column(ColumnSpec::text("username").not_null().unique())
            .column(ColumnSpec::text("password").not_null())
            .column(ColumnSpec::text("role").default_text(Role::default().as_str()))
    }
}
