use serde::{Deserialize, Serialize};

use super::money::{deserialize_id, deserialize_optional_id, Money};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Account {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub starting_balance: Money,
    #[serde(default)]
    pub round_up_enabled: bool,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub round_up_pot: Option<Money>,
}

impl Account {
    pub fn round_up_display(&self) -> &'static str {
        if self.round_up_enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    }

    /// Round-up savings can only be reclaimed while the feature is on.
    pub fn can_reclaim_round_up(&self) -> bool {
        self.round_up_enabled
    }
}

/// Body for `POST /accounts/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct NewAccount {
    pub name: String,
    pub starting_balance: Money,
    pub round_up_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    pub account_type: String,
}

impl NewAccount {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.starting_balance.as_str().trim().is_empty() {
            return Err("Please fill in all required fields.".to_string());
        }
        if self.starting_balance.to_f64().is_none() {
            return Err("Starting balance must be a number.".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct CurrentBalance {
    pub current_balance: Money,
}

/// Response of the round-up toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct RoundUpStatus {
    pub round_up_enabled: bool,
}

impl RoundUpStatus {
    pub fn message(&self) -> String {
        let state = if self.round_up_enabled { "enabled" } else { "disabled" };
        format!("Round Up has been {}.", state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct RoundUpReclaim {
    pub reclaim_amount: Money,
}

/// Spending grouped by recipient account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct SpendingTrend {
    #[serde(rename = "to_account__name", default)]
    pub to_account_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id", rename = "to_account")]
    pub to_account_id: Option<String>,
    pub total: Money,
}

impl SpendingTrend {
    pub fn recipient(&self) -> &str {
        self.to_account_name.as_deref().unwrap_or("Unknown")
    }
}
