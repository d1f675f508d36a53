//! HashVault content store clients.
//!
//! A content store turns raw bytes into a deterministic content address. The
//! upload core only sees the [`ContentStore`] trait; [`HttpContentStore`]
//! talks to an IPFS HTTP API and [`MemoryContentStore`] keeps blobs in memory
//! for tests and offline runs.

pub mod http;
pub mod memory;
pub mod store;

pub use http::{gateway_url, HttpContentStore, DEFAULT_API_URL, DEFAULT_GATEWAY_URL};
pub use memory::MemoryContentStore;
pub use store::{ContentStore, Result, StoreError};

#[cfg(test)]
mod tests;
