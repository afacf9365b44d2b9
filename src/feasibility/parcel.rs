//! Parcel attributes consumed by policy formulas and rate tables

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::ParcelId;
use crate::expression::{AttributeSource, Value};

/// Attributes of one parcel: geography codes plus named metrics and labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelAttributes {
    pub parcel_id: ParcelId,
    #[serde(default)]
    pub jurisdiction: String,
    #[serde(default)]
    pub county: String,
    /// Numeric metrics (e.g. vmt_per_capita, land_value_per_sqft, tra_id)
    #[serde(default)]
    pub values: AHashMap<String, f64>,
    /// Categorical codes (e.g. vmt_res_cat)
    #[serde(default)]
    pub labels: AHashMap<String, String>,
}

impl ParcelAttributes {
    pub fn new(parcel_id: ParcelId, jurisdiction: &str, county: &str) -> Self {
        Self {
            parcel_id,
            jurisdiction: jurisdiction.to_string(),
            county: county.to_string(),
            values: AHashMap::new(),
            labels: AHashMap::new(),
        }
    }

    pub fn with_value(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn with_label(mut self, name: &str, label: &str) -> Self {
        self.labels.insert(name.to_string(), label.to_string());
        self
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Text form of a geography-like attribute, whichever map holds it
    pub fn code(&self, name: &str) -> Option<String> {
        self.attribute(name).map(|v| v.to_string())
    }
}

impl AttributeSource for ParcelAttributes {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "parcel_id" => Some(Value::Number(self.parcel_id.0 as f64)),
            "jurisdiction" => Some(Value::Text(self.jurisdiction.clone())),
            "county" => Some(Value::Text(self.county.clone())),
            _ => self
                .values
                .get(name)
                .map(|v| Value::Number(*v))
                .or_else(|| self.labels.get(name).map(|s| Value::Text(s.clone()))),
        }
    }
}

/// Parcel attribute table keyed by parcel id
///
/// Serialized as a list of parcels ordered by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ParcelAttributes>", into = "Vec<ParcelAttributes>")]
pub struct ParcelTable {
    parcels: AHashMap<ParcelId, ParcelAttributes>,
}

impl ParcelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parcel: ParcelAttributes) {
        self.parcels.insert(parcel.parcel_id, parcel);
    }

    pub fn get(&self, parcel_id: ParcelId) -> Option<&ParcelAttributes> {
        self.parcels.get(&parcel_id)
    }

    /// Set a numeric attribute, creating a bare parcel entry if needed
    pub fn set_value(&mut self, parcel_id: ParcelId, name: &str, value: f64) {
        self.parcels
            .entry(parcel_id)
            .or_insert_with(|| ParcelAttributes {
                parcel_id,
                ..Default::default()
            })
            .values
            .insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParcelAttributes> {
        self.parcels.values()
    }
}

impl FromIterator<ParcelAttributes> for ParcelTable {
    fn from_iter<I: IntoIterator<Item = ParcelAttributes>>(iter: I) -> Self {
        let mut table = Self::new();
        for parcel in iter {
            table.insert(parcel);
        }
        table
    }
}

impl From<Vec<ParcelAttributes>> for ParcelTable {
    fn from(parcels: Vec<ParcelAttributes>) -> Self {
        parcels.into_iter().collect()
    }
}

impl From<ParcelTable> for Vec<ParcelAttributes> {
    fn from(table: ParcelTable) -> Self {
        let mut parcels: Vec<ParcelAttributes> = table.parcels.into_values().collect();
        parcels.sort_by_key(|p| p.parcel_id);
        parcels
    }
}
