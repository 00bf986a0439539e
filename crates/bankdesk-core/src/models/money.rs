use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

/// A monetary amount exactly as the API sent it.
///
/// Django's decimal fields arrive as strings (`"12.50"`), computed totals
/// sometimes as JSON numbers. The text is kept verbatim so no precision is
/// lost in transit; parse it only for display or validation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(transparent)]
pub struct Money(String);

impl Money {
    pub fn new(amount: impl Into<String>) -> Self {
        Self(amount.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric value. Infinities and NaN are not amounts.
    pub fn to_f64(&self) -> Option<f64> {
        self.0
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    pub fn is_positive(&self) -> bool {
        self.to_f64().is_some_and(|v| v > 0.0)
    }

    /// Two decimal places, for display next to a currency symbol.
    pub fn display(&self) -> String {
        match self.to_f64() {
            Some(v) => format!("{:.2}", v),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Money {
    fn from(amount: &str) -> Self {
        Self::new(amount)
    }
}

struct StringOrNumberVisitor;

impl<'de> de::Visitor<'de> for StringOrNumberVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or number")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(v.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StringOrNumberVisitor).map(Money)
    }
}

/// Primary and foreign keys come back as integers or strings depending on
/// the endpoint; both are held as strings.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StringOrNumberVisitor)
}

pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_id")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?
        .map(|Wrapper(id)| id)
        .filter(|id| !id.is_empty()))
}
