pub mod detection;
pub mod live_updates;
pub mod session;
