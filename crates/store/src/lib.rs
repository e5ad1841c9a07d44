//! Document-store and settings adapters.
//!
//! Implements [`pipeline::DocumentStore`] with an in-memory collection map
//! that can be seeded from, and written back to, a JSON snapshot file, and
//! [`pipeline::SettingsProvider`] over a fixed set of configured stage
//! templates.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** File I/O and snapshot encoding live here. The
//! [`pipeline`] crate sees only the port traits.

mod documents;
mod errors;
mod settings;

pub use documents::{InMemoryDocumentStore, Snapshot};
pub use errors::StoreError;
pub use settings::StaticSettings;
