use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Reads a step timeout given in whole seconds
pub(crate) fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}
