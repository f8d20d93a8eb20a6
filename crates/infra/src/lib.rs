//! Infrastructure layer: storage, locking, config and the production service.

pub mod config;
pub mod locks;
pub mod production_service;
pub mod repository;


pub use config::ServiceConfig;
pub use locks::{LockError, ProjectLocks};
pub use production_service::{ProductionService, RunHistory, ServiceError};
pub use repository::{
    BomLineFilter, ChangeSet, InMemoryProductionRepository, ProductionRepository, RepositoryError,
};
