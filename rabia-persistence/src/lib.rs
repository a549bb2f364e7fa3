//! # Rabia Persistence
//!
//! Decision-log-centric persistence implementations for the Rabia consensus protocol:
//! an append-only decision log, a latest-wins snapshot slot, and a small metadata
//! record, matching the minimum crash-recovery interface `PersistenceLayer` requires.
//!
//! ## Implementations
//!
//! - [`InMemoryPersistence`] - non-persistent, for testing and single-process clusters.
//! - [`FileSystemPersistence`] - persists across restarts via three files on disk.
//!
//! ## Example
//!
//! ```rust
//! use rabia_persistence::InMemoryPersistence;
//! use rabia_core::persistence::{PersistedDecision, PersistenceLayer};
//! use rabia_core::PhaseId;
//!
//! # tokio_test::block_on(async {
//! let persistence = InMemoryPersistence::new();
//! let decision = PersistedDecision::new(PhaseId::new(1), None);
//! persistence.persist_decision(&decision).await.unwrap();
//! let decisions = persistence.load_decisions().await.unwrap();
//! assert_eq!(decisions.len(), 1);
//! # });
//! ```

pub mod file_system;
pub mod in_memory;

pub use file_system::FileSystemPersistence;
pub use in_memory::InMemoryPersistence;
