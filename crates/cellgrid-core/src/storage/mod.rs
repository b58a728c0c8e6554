//! Persistent storage.

pub mod checksum;
pub mod codec;

pub use codec::{Snapshot, decode, encode};
