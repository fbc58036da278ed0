use std::time::Duration;

use flowserial_frame::FrameConfig;

/// What to do with an incoming write that runs past the end of the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Store the bytes that fit and drop the rest.
    #[default]
    Clamp,
    /// Drop the whole write.
    Reject,
}

/// Behaviour of a [`Socket`](crate::Socket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// How long `read` waits for the answer to one request.
    pub read_timeout: Duration,
    /// How many requests `read` sends before giving up.
    pub read_attempts: u32,
    /// Out-of-range write handling.
    pub write_policy: WritePolicy,
    /// Parser limits.
    pub frame: FrameConfig,
}

impl SocketConfig {
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
    pub const DEFAULT_READ_ATTEMPTS: u32 = 3;
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            read_attempts: Self::DEFAULT_READ_ATTEMPTS,
            write_policy: WritePolicy::default(),
            frame: FrameConfig::default(),
        }
    }
}
