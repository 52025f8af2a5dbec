/// Sessions are addressed by random UUIDs.
pub type SessionId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// 1-based ordinal of a frame within its video.
pub type FrameIndex = u64;
