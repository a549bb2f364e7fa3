//! The replicated KV state machine (§4.G) and a convenience wrapper around it.
//!
//! `KVStateMachine` is what gets handed to `ReplicationDriver` as the `SM` type
//! parameter: it only knows how to apply one decided `Command` at a time. `KVStore`
//! wraps it behind an `Arc<Mutex<_>>` plus the notification bus, and additionally
//! exposes `find`, the one operation that bypasses consensus entirely.

use crate::notifications::{ChangeType, KVNotificationBus};
use crate::operations::{KVChangeEvent, KVCommand, KVCommandResult, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use rabia_core::state_machine::{Snapshot, StateMachine};
use rabia_core::{Command, RabiaError, Result, StructuredKey, StructuredPattern};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type ChangeCallback = Box<dyn Fn(KVChangeEvent) + Send + Sync>;

/// Configuration for the KV store.
#[derive(Debug, Clone)]
pub struct KVStoreConfig {
    /// Maximum number of keys to store; `Put` beyond this limit fails client-side
    /// before a batch is ever submitted.
    pub max_keys: usize,
    /// Maximum value size in bytes.
    pub max_value_size: usize,
}

impl Default for KVStoreConfig {
    fn default() -> Self {
        Self {
            max_keys: 1_000_000,
            max_value_size: 1024 * 1024,
        }
    }
}

/// Snapshot of the whole keyspace, serialized into `Snapshot::data` by
/// `KVStateMachine::create_snapshot`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreImage {
    entries: HashMap<StructuredKey, Bytes>,
}

/// The replicated state machine: `Put`/`Get`/`Remove` over structured keys.
///
/// `Get` is applied through the log like any other command so that every node's
/// observers see it (§4.G); a driver that wants linearizable reads without log cost may
/// short-circuit `Get` before proposing it, which this type does not prevent or require.
#[derive(Default)]
pub struct KVStateMachine {
    data: HashMap<StructuredKey, Bytes>,
    version: u64,
    observers: Vec<ChangeCallback>,
}

impl std::fmt::Debug for KVStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KVStateMachine")
            .field("keys", &self.data.len())
            .field("version", &self.version)
            .finish()
    }
}

impl Clone for KVStateMachine {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            version: self.version,
            observers: Vec::new(),
        }
    }
}

impl KVStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, event: KVChangeEvent) {
        for observer in &self.observers {
            observer(event.clone());
        }
    }

    /// Local-only range query (§4.G): reads the current in-memory state directly,
    /// never traverses consensus, and reflects this node's view at call time.
    pub fn find(&self, pattern: &StructuredPattern) -> Vec<(StructuredKey, Bytes)> {
        self.data
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl StateMachine for KVStateMachine {
    type State = HashMap<StructuredKey, Bytes>;
    type ChangeEvent = KVChangeEvent;

    async fn apply_command(&mut self, command: &Command) -> Result<Bytes> {
        let op = KVCommand::decode(&command.data)?;
        let result = match op {
            KVCommand::Put { key, value } => {
                let prior_value = self.data.insert(key.clone(), value.clone());
                self.version += 1;
                self.notify(KVChangeEvent::ValuePut {
                    key,
                    value,
                    prior_value: prior_value.clone(),
                });
                KVCommandResult::Put { prior_value }
            }
            KVCommand::Get { key } => {
                let value = self.data.get(&key).cloned();
                self.notify(KVChangeEvent::ValueGet {
                    key,
                    value: value.clone(),
                });
                KVCommandResult::Get { value }
            }
            KVCommand::Remove { key } => {
                let prior_value = self.data.remove(&key);
                if prior_value.is_some() {
                    self.version += 1;
                }
                self.notify(KVChangeEvent::ValueRemove {
                    key,
                    prior_value: prior_value.clone(),
                });
                KVCommandResult::Remove { prior_value }
            }
        };
        result.encode()
    }

    async fn create_snapshot(&self) -> Result<Snapshot> {
        let image = StoreImage {
            entries: self.data.clone(),
        };
        let serialized = serde_json::to_vec(&image)?;
        Ok(Snapshot::new(self.version, serialized))
    }

    async fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        if !snapshot.verify_checksum() {
            return Err(RabiaError::ChecksumMismatch {
                expected: snapshot.checksum,
                actual: crc32fast::hash(&snapshot.data),
            });
        }

        for key in self.data.keys().cloned().collect::<Vec<_>>() {
            let prior_value = self.data.remove(&key);
            self.notify(KVChangeEvent::ValueRemove { key, prior_value });
        }

        let image: StoreImage = serde_json::from_slice(&snapshot.data)?;
        self.data = image.entries;
        self.version = snapshot.version;
        for (key, value) in &self.data {
            self.notify(KVChangeEvent::ValuePut {
                key: key.clone(),
                value: value.clone(),
                prior_value: None,
            });
        }
        Ok(())
    }

    async fn get_state(&self) -> Self::State {
        self.data.clone()
    }

    fn reset(&mut self) {
        for key in self.data.keys().cloned().collect::<Vec<_>>() {
            let prior_value = self.data.remove(&key);
            self.notify(KVChangeEvent::ValueRemove { key, prior_value });
        }
        self.version = 0;
    }

    fn observe_state_changes(&mut self, callback: Box<dyn Fn(KVChangeEvent) + Send + Sync>) {
        self.observers.push(callback);
    }
}

/// Convenience wrapper bundling a shared `KVStateMachine` with a notification bus that
/// forwards every `KVChangeEvent` as a `ChangeNotification`, and client-side validation
/// against `KVStoreConfig`. The embedding application hands `state_machine()` to
/// `ReplicationDriver`; `find` and `notification_bus` are used directly, bypassing the
/// engine.
pub struct KVStore {
    config: KVStoreConfig,
    state_machine: Arc<Mutex<KVStateMachine>>,
    notification_bus: Arc<KVNotificationBus>,
}

impl KVStore {
    pub fn new(config: KVStoreConfig) -> Self {
        let notification_bus = Arc::new(KVNotificationBus::new());
        let mut sm = KVStateMachine::new();
        let bus_for_callback = notification_bus.clone();
        sm.observe_state_changes(Box::new(move |event| {
            let bus = bus_for_callback.clone();
            let event = event.clone();
            tokio::spawn(async move {
                bus.publish_change(event).await;
            });
        }));

        Self {
            config,
            state_machine: Arc::new(Mutex::new(sm)),
            notification_bus,
        }
    }

    pub fn state_machine(&self) -> Arc<Mutex<KVStateMachine>> {
        self.state_machine.clone()
    }

    pub fn notification_bus(&self) -> &Arc<KVNotificationBus> {
        &self.notification_bus
    }

    pub fn validate_key(&self, key: &StructuredKey) -> std::result::Result<(), StoreError> {
        if key.segments().is_empty() {
            return Err(StoreError::InvalidKey);
        }
        Ok(())
    }

    pub fn validate_value(&self, value: &Bytes) -> std::result::Result<(), StoreError> {
        if value.len() > self.config.max_value_size {
            return Err(StoreError::ValueTooLarge {
                max: self.config.max_value_size,
            });
        }
        Ok(())
    }

    pub fn can_accept_new_key(&self, key: &StructuredKey, len_hint: usize) -> std::result::Result<(), StoreError> {
        if len_hint >= self.config.max_keys {
            return Err(StoreError::StoreFull {
                max: self.config.max_keys,
            });
        }
        let _ = key;
        Ok(())
    }

    /// Local-only range query, delegating to the underlying state machine (§4.G).
    pub async fn find(&self, pattern: &StructuredPattern) -> Vec<(StructuredKey, Bytes)> {
        self.state_machine.lock().await.find(pattern)
    }

    pub async fn len(&self) -> usize {
        self.state_machine.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state_machine.lock().await.is_empty()
    }
}

impl KVChangeEvent {
    pub(crate) fn change_type(&self) -> ChangeType {
        match self {
            KVChangeEvent::ValuePut { prior_value, .. } => {
                if prior_value.is_some() {
                    ChangeType::Updated
                } else {
                    ChangeType::Created
                }
            }
            KVChangeEvent::ValueGet { .. } => ChangeType::Read,
            KVChangeEvent::ValueRemove { .. } => ChangeType::Deleted,
        }
    }
}
