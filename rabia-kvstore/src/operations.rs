//! KV commands, wire encoding, and the change notifications they produce.
//!
//! Commands here are the application-level payload carried inside `rabia_core::Command`;
//! the engine never looks inside them. `Find` is the one operation that is *not* a
//! `KVCommand`: it is local-only and never enters the replicated log (§4.G).

use bytes::Bytes;
use rabia_core::{RabiaError, Result, StructuredKey, StructuredPattern};
use serde::{Deserialize, Serialize};

/// A replicated KV command. Serialized into `Command::data` for proposal, and decoded
/// back out by `KVStateMachine::apply_command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KVCommand {
    Put { key: StructuredKey, value: Bytes },
    Get { key: StructuredKey },
    Remove { key: StructuredKey },
}

impl KVCommand {
    pub fn key(&self) -> &StructuredKey {
        match self {
            KVCommand::Put { key, .. } => key,
            KVCommand::Get { key } => key,
            KVCommand::Remove { key } => key,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, KVCommand::Put { .. } | KVCommand::Remove { .. })
    }

    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(RabiaError::from)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(RabiaError::from)
    }
}

/// Response payload encoded into the `Bytes` returned by `apply_command`, so a caller
/// reading the decision stream can recover the effect without re-reading local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KVCommandResult {
    Put { prior_value: Option<Bytes> },
    Get { value: Option<Bytes> },
    Remove { prior_value: Option<Bytes> },
}

impl KVCommandResult {
    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(RabiaError::from)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(RabiaError::from)
    }
}

/// Change notification emitted by `KVStateMachine` for every applied command (§4.G).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KVChangeEvent {
    ValuePut {
        key: StructuredKey,
        value: Bytes,
        prior_value: Option<Bytes>,
    },
    ValueGet {
        key: StructuredKey,
        value: Option<Bytes>,
    },
    ValueRemove {
        key: StructuredKey,
        prior_value: Option<Bytes>,
    },
}

impl KVChangeEvent {
    pub fn key(&self) -> &StructuredKey {
        match self {
            KVChangeEvent::ValuePut { key, .. } => key,
            KVChangeEvent::ValueGet { key, .. } => key,
            KVChangeEvent::ValueRemove { key, .. } => key,
        }
    }

    /// Tests this notification's key against a structured pattern.
    pub fn matches(&self, pattern: &StructuredPattern) -> bool {
        pattern.matches(self.key())
    }
}

/// Error taxonomy for this crate's local-only operations (the `Find` range query and
/// snapshot bookkeeping). Replicated-command failures flow through `RabiaError` instead,
/// since they must cross the engine/driver boundary.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("key exceeds maximum length")]
    InvalidKey,
    #[error("value exceeds maximum size of {max} bytes")]
    ValueTooLarge { max: usize },
    #[error("store is at capacity ({max} keys)")]
    StoreFull { max: usize },
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("snapshot is invalid or corrupt")]
    InvalidSnapshot,
    #[error("store is shutting down")]
    ShuttingDown,
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidKey | StoreError::ValueTooLarge { .. }
        )
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::InvalidSnapshot | StoreError::Internal(_))
    }
}
