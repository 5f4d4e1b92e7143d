//! # fomz-cloud
//!
//! Owner-scoped, queryable storage for forms, drafts and responses on top of
//! a hosted document store.
//!
//! The hosted store is reached only through the [`DocumentStore`] trait;
//! [`MemoryDocumentStore`] implements it in-process with the same access
//! rules the hosted service enforces. [`CloudStore`] layers the form, draft
//! and response semantics on top.

pub mod document;
pub mod drafts;
pub mod forms;
pub mod memory;
pub mod responses;
pub mod store;

pub use document::{server_timestamp, Direction, DocumentStore, Query, Snapshot};
pub use forms::PublishResult;
pub use memory::MemoryDocumentStore;
pub use store::CloudStore;
