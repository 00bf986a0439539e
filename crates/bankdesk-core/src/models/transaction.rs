use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::{deserialize_id, deserialize_optional_id, Money};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    #[default]
    Payment,
    Withdrawal,
    Deposit,
    Transfer,
    /// Any type this client does not know about, kept verbatim.
    Other(String),
}

/// Which way money moves for the source account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
    Neutral,
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Deposit => "deposit",
            TransactionType::Transfer => "transfer",
            TransactionType::Other(s) => s,
        }
    }

    pub fn display_name(&self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            TransactionType::Deposit => Direction::Credit,
            TransactionType::Payment | TransactionType::Withdrawal => Direction::Debit,
            TransactionType::Transfer | TransactionType::Other(_) => Direction::Neutral,
        }
    }
}

impl From<String> for TransactionType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "payment" => TransactionType::Payment,
            "withdrawal" => TransactionType::Withdrawal,
            "deposit" => TransactionType::Deposit,
            "transfer" => TransactionType::Transfer,
            _ => TransactionType::Other(s),
        }
    }
}

impl From<TransactionType> for String {
    fn from(t: TransactionType) -> Self {
        t.as_str().to_string()
    }
}

impl std::str::FromStr for TransactionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TransactionType::from(s.to_string()))
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Transaction {
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub transaction_type: TransactionType,
    pub amount: Money,
    #[serde(deserialize_with = "deserialize_id")]
    pub from_account: String,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub to_account: Option<String>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn involves(&self, account_id: &str) -> bool {
        self.from_account == account_id || self.to_account.as_deref() == Some(account_id)
    }
}

/// Body for `POST /transactions/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct NewTransaction {
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub from_account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_account: Option<String>,
}

impl NewTransaction {
    /// A payment from `from_account`.
    pub fn payment(from_account: &str, amount: Money) -> Self {
        Self {
            transaction_type: TransactionType::Payment,
            amount,
            from_account: from_account.to_string(),
            to_account: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.amount.as_str().trim().is_empty() || self.from_account.trim().is_empty() {
            return Err("Please fill in all required fields.".to_string());
        }
        if !self.amount.is_positive() {
            return Err("Amount must be greater than zero.".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct TopSpender {
    #[serde(rename = "to_account__name", default)]
    pub to_account_name: Option<String>,
    pub total_spent: Money,
}

impl TopSpender {
    pub fn name(&self) -> &str {
        self.to_account_name.as_deref().unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transaction() {
        let json = r#"{"transaction_type": "deposit", "amount": "20.00", "from_account": 1, "to_account": null, "timestamp": "2024-03-01T09:30:00Z"}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();

        assert_eq!(t.transaction_type, TransactionType::Deposit);
        assert_eq!(t.transaction_type.direction(), Direction::Credit);
        assert_eq!(t.from_account, "1");
        assert_eq!(t.to_account, None);
        assert!(t.involves("1"));
        assert!(!t.involves("2"));
    }

    #[test]
    fn test_unknown_type_round_trips_verbatim() {
        let t: TransactionType = serde_json::from_str(r#""refund""#).unwrap();
        assert_eq!(t, TransactionType::Other("refund".to_string()));
        assert_eq!(t.direction(), Direction::Neutral);
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""refund""#);
    }

    #[test]
    fn test_display_name_is_capitalized() {
        assert_eq!(TransactionType::Withdrawal.display_name(), "Withdrawal");
        assert_eq!(TransactionType::Payment.direction(), Direction::Debit);
        assert_eq!("TRANSFER".parse::<TransactionType>().unwrap(), TransactionType::Transfer);
    }

    #[test]
    fn test_new_transaction_body_and_validation() {
        let payment = NewTransaction::payment("1", Money::new("12.50"));
        assert!(payment.validate().is_ok());
        assert_eq!(
            serde_json::to_value(&payment).unwrap(),
            serde_json::json!({"transaction_type": "payment", "amount": "12.50", "from_account": "1"})
        );

        let zero = NewTransaction::payment("1", Money::new("0"));
        assert_eq!(zero.validate().unwrap_err(), "Amount must be greater than zero.");

        let overflow = NewTransaction::payment("1", Money::new("1e400"));
        assert_eq!(overflow.validate().unwrap_err(), "Amount must be greater than zero.");

        let no_source = NewTransaction::payment("", Money::new("5"));
        assert_eq!(no_source.validate().unwrap_err(), "Please fill in all required fields.");
    }

    #[test]
    fn test_top_spender_name() {
        let s: TopSpender = serde_json::from_str(r#"{"total_spent": 99.5}"#).unwrap();
        assert_eq!(s.name(), "Unknown");
        assert_eq!(s.total_spent.display(), "99.50");
    }
}
