//! Persistence implementations

pub mod memory;

#[cfg(feature = "postgres")]
pub mod agent_repository;
#[cfg(feature = "postgres")]
pub mod call_record_repository;
#[cfg(feature = "postgres")]
pub mod database;

pub use memory::{InMemoryAgentRepository, InMemoryCallRecordRepository};

#[cfg(feature = "postgres")]
pub use agent_repository::PgAgentRepository;
#[cfg(feature = "postgres")]
pub use call_record_repository::PgCallRecordRepository;
#[cfg(feature = "postgres")]
pub use database::{create_pool, run_migrations, PoolConfig};
