//! rusty-press/crates/storage-adapters/src/lib.rs
//!
//! Backend adapters implementing the domain ports, compiled to order via
//! feature flags.

#[cfg(feature = "backend-memory")]
pub mod memory;

#[cfg(feature = "backend-memory")]
pub use memory::MemoryBackend;
