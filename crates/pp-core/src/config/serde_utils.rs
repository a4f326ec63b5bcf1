//! Field adapters for `#[serde(with = ...)]` on config structs

/// Stores a [`Duration`](std::time::Duration) as an integer number of seconds.
///
/// Config files write `resolve_timeout = 3` rather than a `{ secs, nanos }`
/// table. Anything below one second is truncated on write.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
