use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::search::Coordinates;
use crate::search::error::SearchError;

/// A relief center as returned by the search endpoint.
///
/// The endpoint is free to omit anything, so the record keeps the raw JSON and
/// every accessor returns an `Option`. Fallback text lives with the marker
/// projection, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReliefCenterRecord(Value);

impl ReliefCenterRecord {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Search-engine hits nest the document under `_source`.
    fn source(&self) -> &Value {
        match self.0.get("_source") {
            Some(src) if src.is_object() => src,
            _ => &self.0,
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        let s = self.source().get(key)?.as_str()?.trim();
        (!s.is_empty()).then(|| s.to_string())
    }

    pub fn name(&self) -> Option<String> {
        self.text("name")
    }

    pub fn address(&self) -> Option<String> {
        self.text("address")
    }

    pub fn contact(&self) -> Option<String> {
        self.text("contact")
    }

    /// Either a plain string or a list of strings.
    pub fn resources(&self) -> Option<String> {
        match self.source().get("resources")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Array(items) => {
                let parts: Vec<&str> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            _ => None,
        }
    }

    pub fn lat(&self) -> Option<f64> {
        self.coordinate("lat")
    }

    pub fn lon(&self) -> Option<f64> {
        self.coordinate("lon")
    }

    fn coordinate(&self, key: &str) -> Option<f64> {
        match self.source().get("location")?.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    /// Position with each missing axis defaulting to zero.
    pub fn position(&self) -> Coordinates {
        Coordinates {
            lat: self.lat().unwrap_or(0.0),
            lon: self.lon().unwrap_or(0.0),
        }
    }
}

/// Accepts a bare array of records or a `{"hits": {"hits": [...]}}` envelope.
pub fn parse_records(body: &str) -> Result<Vec<ReliefCenterRecord>, SearchError> {
    let value: Value = serde_json::from_str(body)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj
            .get_mut("hits")
            .and_then(|h| h.get_mut("hits"))
            .map(Value::take)
        {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(SearchError::Decode(
                    "expected a JSON array of relief centers".into(),
                ));
            }
        },
        _ => {
            return Err(SearchError::Decode(
                "expected a JSON array of relief centers".into(),
            ));
        }
    };
    Ok(items.into_iter().map(ReliefCenterRecord::new).collect())
}
