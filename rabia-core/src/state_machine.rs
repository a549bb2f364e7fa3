use crate::{Command, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single state-change event emitted by `InMemoryStateMachine`.
///
/// `restore_snapshot` emits `ResetAll` followed by one `Set` per restored entry, so a
/// subscriber that only ever applies events (rather than re-reading the whole state)
/// stays in sync across a snapshot restore.
#[derive(Debug, Clone)]
pub enum InMemoryChangeEvent {
    Set(String, Bytes),
    Removed(String),
    ResetAll,
}

type ChangeCallback<E> = Box<dyn Fn(E) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub data: Bytes,
    pub checksum: u32,
}

impl Snapshot {
    pub fn new(version: u64, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let checksum = crc32fast::hash(&data);
        Self {
            version,
            data,
            checksum,
        }
    }

    pub fn verify_checksum(&self) -> bool {
        crc32fast::hash(&self.data) == self.checksum
    }
}

#[async_trait]
pub trait StateMachine: Send + Sync {
    type State: Clone + Send + Sync;
    type ChangeEvent: Clone + Send + Sync;

    async fn apply_command(&mut self, command: &Command) -> Result<Bytes>;

    async fn apply_commands(&mut self, commands: &[Command]) -> Result<Vec<Bytes>> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.apply_command(command).await?);
        }
        Ok(results)
    }

    async fn create_snapshot(&self) -> Result<Snapshot>;

    /// Atomically replaces all state. Implementers must emit a "remove-all" change for
    /// prior contents followed by "put" changes for restored contents, so subscribers
    /// registered via `observe_state_changes` never see a torn view.
    async fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()>;

    async fn get_state(&self) -> Self::State;

    fn is_deterministic(&self) -> bool {
        true
    }

    /// Restores the initial (empty) state.
    fn reset(&mut self);

    /// Registers a notification sink invoked for every state change, including those
    /// produced by `restore_snapshot`.
    fn observe_state_changes(&mut self, callback: ChangeCallback<Self::ChangeEvent>);
}

#[derive(Default)]
pub struct InMemoryStateMachine {
    pub state: std::collections::HashMap<String, Bytes>,
    pub version: u64,
    observers: Vec<ChangeCallback<InMemoryChangeEvent>>,
}

impl std::fmt::Debug for InMemoryStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateMachine")
            .field("state", &self.state)
            .field("version", &self.version)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Clone for InMemoryStateMachine {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            version: self.version,
            observers: Vec::new(),
        }
    }
}

impl InMemoryStateMachine {
    pub fn new() -> Self {
        Self {
            state: std::collections::HashMap::new(),
            version: 0,
            observers: Vec::new(),
        }
    }

    fn notify(&self, event: InMemoryChangeEvent) {
        for observer in &self.observers {
            observer(event.clone());
        }
    }
}

#[async_trait]
impl StateMachine for InMemoryStateMachine {
    type State = std::collections::HashMap<String, Bytes>;
    type ChangeEvent = InMemoryChangeEvent;

    async fn apply_command(&mut self, command: &Command) -> Result<Bytes> {
        let command_str = String::from_utf8_lossy(&command.data);
        let parts: Vec<String> = command_str
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();

        if parts.is_empty() {
            return Ok(Bytes::from("ERROR: Empty command"));
        }

        match parts[0].as_str() {
            "SET" if parts.len() == 3 => {
                let key = parts[1].clone();
                let value = Bytes::from(parts[2].clone());
                self.state.insert(key.clone(), value.clone());
                self.version += 1;
                self.notify(InMemoryChangeEvent::Set(key, value));
                Ok(Bytes::from("OK"))
            }
            "GET" if parts.len() == 2 => {
                let key = &parts[1];
                match self.state.get(key) {
                    Some(value) => Ok(value.clone()),
                    None => Ok(Bytes::from("NOT_FOUND")),
                }
            }
            "DEL" if parts.len() == 2 => {
                let key = &parts[1];
                match self.state.remove(key) {
                    Some(_) => {
                        self.version += 1;
                        self.notify(InMemoryChangeEvent::Removed(key.clone()));
                        Ok(Bytes::from("OK"))
                    }
                    None => Ok(Bytes::from("NOT_FOUND")),
                }
            }
            _ => Ok(Bytes::from("ERROR: Invalid command")),
        }
    }

    async fn create_snapshot(&self) -> Result<Snapshot> {
        let serialized = serde_json::to_vec(&self.state)?;
        Ok(Snapshot::new(self.version, serialized))
    }

    async fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        if !snapshot.verify_checksum() {
            return Err(crate::RabiaError::ChecksumMismatch {
                expected: snapshot.checksum,
                actual: crc32fast::hash(&snapshot.data),
            });
        }

        self.notify(InMemoryChangeEvent::ResetAll);
        self.state = serde_json::from_slice(&snapshot.data)?;
        self.version = snapshot.version;
        for (key, value) in &self.state {
            self.notify(InMemoryChangeEvent::Set(key.clone(), value.clone()));
        }
        Ok(())
    }

    async fn get_state(&self) -> Self::State {
        self.state.clone()
    }

    fn reset(&mut self) {
        self.notify(InMemoryChangeEvent::ResetAll);
        self.state.clear();
        self.version = 0;
    }

    fn observe_state_changes(&mut self, callback: ChangeCallback<Self::ChangeEvent>) {
        self.observers.push(callback);
    }
}
