//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated calendar year
pub type Year = u32;

/// Currency amount (signed, dollars)
pub type Money = f64;

/// Parcel identifier from the regional parcel inventory
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ParcelId(pub u64);

impl fmt::Display for ParcelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parcel:{}", self.0)
    }
}

/// Identifier of a building created by the placement service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingId(pub u64);

/// Named partition of an account (e.g. a jurisdiction)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubaccountId(pub String);

impl SubaccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The catch-all subaccount used when an account is not sub-divided
    pub fn regional() -> Self {
        Self("regional".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubaccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubaccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Development form evaluated by the pro forma
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Form {
    Residential,
    Office,
    Retail,
    Industrial,
}

impl Form {
    pub const ALL: [Form; 4] = [
        Form::Residential,
        Form::Office,
        Form::Retail,
        Form::Industrial,
    ];

    /// Whether the form produces housing units (vs. non-residential sqft)
    pub fn is_residential(&self) -> bool {
        matches!(self, Form::Residential)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Form::Residential => "residential",
            Form::Office => "office",
            Form::Retail => "retail",
            Form::Industrial => "industrial",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
