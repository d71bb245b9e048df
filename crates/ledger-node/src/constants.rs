/// Width of the ASCII decimal length prefix on every frame.
pub const HEADER_SIZE: usize = 10;
pub const DEFAULT_PORT: u16 = 6001;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
/// Characters of a payload echoed into log lines.
pub const LOG_PREVIEW_CHARS: usize = 100;
