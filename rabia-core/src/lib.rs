//! # Rabia Core
//!
//! Core components and types for the Rabia consensus protocol implementation.
//!
//! This crate provides the fundamental building blocks for implementing
//! the Rabia consensus algorithm, including:
//!
//! ## Key Components
//!
//! - **Messages**: Protocol messages for communication between nodes
//! - **State Machine**: Interface and implementation for deterministic state transitions
//! - **Types**: Core types like NodeId, BatchId, PhaseId, and Commands
//! - **Error Handling**: Comprehensive error types and recovery mechanisms
//! - **Validation**: Message and state validation utilities
//! - **Serialization**: High-performance binary serialization
//! - **Memory Management**: Optimized memory pools for reduced allocations
//! - **Batching**: Command batching for improved throughput
//!
//! ## Example Usage
//!
//! ```rust
//! use rabia_core::{Command, CommandBatch, NodeId, PhaseId};
//!
//! // Create commands
//! let cmd1 = Command::new("SET key1 value1");
//! let cmd2 = Command::new("GET key1");
//!
//! // Create a batch
//! let batch = CommandBatch::new(vec![cmd1, cmd2]);
//!
//! // Create node and phase identifiers
//! let node_id = NodeId::new();
//! let phase_id = PhaseId::new(1);
//! ```

pub mod error;
pub mod messages;
pub mod state_machine;
pub mod network;
pub mod persistence;
pub mod router;
pub mod types;
pub mod validation;
pub mod serialization;
pub mod memory_pool;
pub mod batching;

// Re-export commonly used types for convenience
pub use error::*;
pub use types::*;
pub use validation::*;
