//! Postgres persistence adapters.
//!
//! Thin sqlx implementations of the `pulsewire-common` boundary traits.
//! No ORM layer: each operation is a single statement, so no transaction
//! is ever held across a provider call.

mod embedding_cache;
mod messages;
mod migrate;
mod sinks;

pub use embedding_cache::CachedEmbedder;
pub use messages::PgMessageStore;
pub use migrate::migrate;
pub use sinks::{PgDeadLetterStore, PgTranslationCache, PgUsageLedger};
