//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a cable client
///
/// All durations serialize as integer milliseconds so the options
/// embed naturally in host configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Interval between heartbeat pings while the session is open
    #[serde(with = "duration_ms")]
    pub ping_interval: Duration,

    /// How long to wait for a Pong before declaring the peer dead
    #[serde(with = "duration_ms")]
    pub ping_timeout: Duration,

    /// Per-request completion timeout
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,

    /// Per-attempt acknowledgment timeout for QoS-1 messages
    #[serde(with = "duration_ms")]
    pub message_timeout: Duration,

    /// Retransmission budget for QoS-1 messages
    pub message_max_retry: u32,

    /// Bound on a single transport-open plus handshake attempt
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            message_timeout: Duration::from_secs(10),
            message_max_retry: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Helper module for Duration serialization as milliseconds
pub mod duration_ms {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserialize a Duration from milliseconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
