//! Repository boundary for the production engine.
//!
//! The engine itself never talks to storage. The service loads a working set
//! through [`ProductionRepository`], runs the engine, and hands every mutation
//! back as one [`ChangeSet`].

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryProductionRepository;
pub use r#trait::{BomLineFilter, ChangeSet, ProductionRepository, RepositoryError};
