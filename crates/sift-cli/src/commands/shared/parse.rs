use serde::de::DeserializeOwned;
use sift_core::enums::{Phase, Verdict};

/// Parse a snake_case enum value using serde-deserialization.
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    let json = format!("\"{normalized}\"");
    serde_json::from_str(&json).map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

pub fn parse_phase(raw: &str) -> anyhow::Result<Phase> {
    parse_enum(raw, "phase")
}

pub fn parse_verdict(raw: &str) -> anyhow::Result<Verdict> {
    parse_enum(raw, "verdict")
}
