use serde::{Deserialize, Serialize};

use super::money::deserialize_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Business {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sanctioned: bool,
}

impl Business {
    /// Case-insensitive match on name or category. An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.category.to_lowercase().contains(&query)
    }

    pub fn sanction_display(&self) -> &'static str {
        if self.sanctioned {
            "Sanctioned"
        } else {
            "Clear"
        }
    }
}

/// Body for `POST /businesses/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct NewBusiness {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub sanctioned: bool,
}

impl NewBusiness {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.category.trim().is_empty() {
            return Err("Please fill in all required fields.".to_string());
        }
        Ok(())
    }
}
