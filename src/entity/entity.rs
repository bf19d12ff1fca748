//! Core entity struct
//!
//! An entity is the unit that flows through the network. The engine only
//! relies on its identifier; the remaining attributes feed message payloads
//! and audit descriptions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{EntityId, Sex};

/// A patient moving through the simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier, unique within one run
    pub id: EntityId,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Date of birth
    pub date_of_birth: NaiveDate,
    /// Administrative sex
    pub sex: Sex,
}

impl Entity {
    /// Create a new entity
    pub fn new(
        id: EntityId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: NaiveDate,
        sex: Sex,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth,
            sex,
        }
    }

    /// Full display name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (ID:{})", self.first_name, self.last_name, self.id)
    }
}
