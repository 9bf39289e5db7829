//! Relay configuration.

use chitty_protocol::MAX_CONTENT_CHARS;

/// Settings for the relay actor.
///
/// ```rust
/// use chitty_relay::RelayConfig;
///
/// let config = RelayConfig {
///     max_content_chars: 256,
///     ..RelayConfig::default()
/// };
/// assert_eq!(config.command_buffer, 64);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Capacity of the actor's command channel. When full, connection
    /// tasks wait before their join/chat/leave is accepted.
    pub command_buffer: usize,

    /// Longest chat content the relay accepts, in characters.
    pub max_content_chars: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            command_buffer: 64,
            max_content_chars: MAX_CONTENT_CHARS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_content_to_128_chars() {
        assert_eq!(RelayConfig::default().max_content_chars, 128);
    }
}
