//! Declarative row-level authorization library.
//!
//! This crate derives composable query filters from named **restrictors**
//! registered on a resource type: `allowed_subjects` answers "which subjects
//! may access this resource instance" and `allowed_resources` answers "which
//! resources may this subject access". Enabled restrictors stack with AND
//! semantics; filters are lazy values executed by a pluggable async store.
//! Use [`Engine`] for composition and [`Restrictor`] builders for
//! registration.
//!
//! # Examples
//!
//! Gating documents to active users with the in-memory store (enable
//! `memory-store`):
//! ```no_run
//! use rs_restrict::{EngineBuilder, Filter, Restrictor, RestrictorName};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use rs_restrict::MemoryStore;
//! # #[derive(Debug, Clone)]
//! # struct User { id: rs_restrict::EntityId, active: bool }
//! # impl rs_restrict::Entity for User {
//! #     fn id(&self) -> &rs_restrict::EntityId { &self.id }
//! # }
//! # #[derive(Debug, Clone)]
//! # struct Document { id: rs_restrict::EntityId }
//! # impl rs_restrict::Entity for Document {
//! #     fn id(&self) -> &rs_restrict::EntityId { &self.id }
//! # }
//! let documents: MemoryStore<Document> = MemoryStore::new();
//! let users: MemoryStore<User> = MemoryStore::new();
//! let engine = EngineBuilder::new(documents, users).build();
//! let name = RestrictorName::try_from("active").unwrap();
//! let restrictor = Restrictor::basic_subject(
//!     name,
//!     Filter::matching(|user: &User| user.active),
//! )
//! .build();
//! let _ = engine.register(restrictor);
//! # }
//! ```
#![forbid(unsafe_code)]

mod compose;
mod engine;
mod error;
mod filter;
mod provider;
mod registry;
mod restrictor;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

pub use crate::engine::{Engine, EngineBuilder};
pub use crate::error::{Error, EvalError, Result, StoreError};
pub use crate::filter::{Filter, Predicate};
pub use crate::provider::Provider;
pub use crate::registry::RestrictorRegistry;
pub use crate::restrictor::{
    Kind, ResourceOverride, Restrictor, RestrictorBuilder, SubjectOverride, ViewMetadata,
};
pub use crate::store::{Entity, EntityStore};
pub use crate::types::{AssociationName, EntityId, IdSet, RestrictorName};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
