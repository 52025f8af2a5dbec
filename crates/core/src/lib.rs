//! Domain types and detection policy shared by every lifeguard crate.
//!
//! Nothing in here performs I/O: the video source, the detector client and
//! the HTTP layer all build on these types.

pub mod detection;
pub mod error;
pub mod policy;
pub mod status;
pub mod types;
