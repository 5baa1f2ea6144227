//! Block storage backends.
//!
//! The chain lives in process memory; [`InMemoryBlockStore`] is the only
//! backend. Other backends implement [`crate::consensus::BlockStore`].

pub mod mem;

pub use mem::InMemoryBlockStore;
