use serde::{Deserialize, Deserializer, Serialize};

/// A sieve rule as written in the configuration.
///
/// Numeric flags accept both numbers and booleans, since hand-edited sieves
/// use either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRule {
    pub link: Option<String>,
    pub img: Option<String>,
    /// Case-insensitivity bits: 1 link, 2 img.
    #[serde(deserialize_with = "lenient_u8")]
    pub ci: u8,
    pub to: Option<String>,
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_res")]
    pub res: Option<String>,
    /// Double-decode bits: 1 link, 2 img, 3 both.
    #[serde(deserialize_with = "lenient_u8")]
    pub dc: u8,
    /// Loop re-entry bits: 1 link, 2 img.
    #[serde(rename = "loop", deserialize_with = "lenient_u8")]
    pub loop_on: u8,
    #[serde(deserialize_with = "lenient_bool")]
    pub useimg: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub off: bool,
    pub note: Option<String>,
}

/// Marker stored in `res` when a rule says `"res": true`.
pub(crate) const RES_JSON: &str = ":json";

fn lenient_u8<'de, D: Deserializer<'de>>(de: D) -> Result<u8, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::Bool(b) => u8::from(b),
        serde_json::Value::Number(n) => n.as_u64().map_or(0, |n| n.min(u64::from(u8::MAX)) as u8),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::String(s) => !s.is_empty() && s != "0",
        _ => false,
    })
}

fn lenient_res<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Bool(true) => Some(RES_JSON.to_string()),
        serde_json::Value::Number(n) if n.as_f64().is_some_and(|n| n != 0.0) => Some(RES_JSON.to_string()),
        _ => None,
    })
}
