/// Runtime value passed as a call argument or returned as a call result.
///
/// Intercepted operations exchange JSON-compatible data with their callers, so
/// the value type is `serde_json::Value`. Listeners can deserialize typed views
/// out of an argument list with `serde_json::from_value`.
pub type Value = serde_json::Value;
