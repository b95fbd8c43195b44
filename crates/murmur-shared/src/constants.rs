/// Maximum size of a single inbound chat frame in bytes (64 KiB)
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Name of the friend group every user gets on creation
pub const DEFAULT_FRIEND_GROUP_NAME: &str = "My Friends";

/// Default lifetime of a session token
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 72;

/// Frames buffered per connection before pushes to it are dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// How long a socket may stay open without presenting a token
pub const IDENTIFY_TIMEOUT_SECS: u64 = 10;

/// Default page size for message history queries
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Default HTTP port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
