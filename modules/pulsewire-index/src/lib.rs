//! Vector index backends.
//!
//! `MemoryVectorIndex` is the zero-dependency default (tests, single-node
//! deployments); `QdrantIndex` talks to a Qdrant server over its REST API.
//! Both implement `pulsewire_common::VectorIndex`.

mod memory;
mod qdrant;

pub use memory::MemoryVectorIndex;
pub use qdrant::QdrantIndex;
