use serde::Serializer;
use std::time::Duration;

/// Writes a step timeout as whole seconds, which is what the execution engine schedules on
pub(crate) fn serialize_timeout<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(value.as_secs())
}
