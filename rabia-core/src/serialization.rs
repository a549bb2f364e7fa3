use crate::{
    memory_pool::{get_pooled_buffer, PooledBuffer},
    messages::ProtocolMessage,
    NodeId, RabiaError, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Trait for efficient message serialization
pub trait MessageSerializer {
    /// Serialize a message to bytes
    fn serialize<T>(&self, data: &T) -> Result<Vec<u8>>
    where
        T: Serialize;

    /// Deserialize bytes to a message
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>;
}

/// JSON serializer (existing implementation)
#[derive(Default, Clone)]
pub struct JsonSerializer;

impl MessageSerializer for JsonSerializer {
    fn serialize<T>(&self, data: &T) -> Result<Vec<u8>>
    where
        T: Serialize,
    {
        serde_json::to_vec(data)
            .map_err(|e| RabiaError::serialization(format!("JSON serialization failed: {}", e)))
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_slice(bytes)
            .map_err(|e| RabiaError::serialization(format!("JSON deserialization failed: {}", e)))
    }
}

/// Binary serializer using bincode (optimized implementation)
#[derive(Default, Clone)]
pub struct BinarySerializer;

impl MessageSerializer for BinarySerializer {
    fn serialize<T>(&self, data: &T) -> Result<Vec<u8>>
    where
        T: Serialize,
    {
        bincode::serialize(data)
            .map_err(|e| RabiaError::serialization(format!("Binary serialization failed: {}", e)))
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        bincode::deserialize(bytes)
            .map_err(|e| RabiaError::serialization(format!("Binary deserialization failed: {}", e)))
    }
}

/// Enum-based serializer that avoids trait object issues
#[derive(Clone)]
pub enum Serializer {
    Json(JsonSerializer),
    Binary(BinarySerializer),
}

impl Default for Serializer {
    fn default() -> Self {
        Self::Binary(BinarySerializer)
    }
}

impl MessageSerializer for Serializer {
    fn serialize<T>(&self, data: &T) -> Result<Vec<u8>>
    where
        T: Serialize,
    {
        match self {
            Self::Json(s) => s.serialize(data),
            Self::Binary(s) => s.serialize(data),
        }
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self {
            Self::Json(s) => s.deserialize(bytes),
            Self::Binary(s) => s.deserialize(bytes),
        }
    }
}

/// Pre-registration gate for encode/decode (§4.E). Types must be registered
/// before they can be encoded or decoded through [`Serializer::encode_checked`]
/// / [`Serializer::decode_checked`]; an unregistered type fails deterministically
/// rather than silently succeeding, since a serialization gap here is a
/// programmer mistake, not a transient data error.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    registered: HashSet<&'static str>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self) {
        self.registered.insert(std::any::type_name::<T>());
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.registered.contains(std::any::type_name::<T>())
    }

    /// A registry pre-populated with every wire message type this crate defines.
    pub fn with_protocol_messages() -> Self {
        let mut registry = Self::new();
        registry.register::<NodeId>();
        registry.register::<ProtocolMessage>();
        registry.register::<crate::messages::ProposeMessage>();
        registry.register::<crate::messages::VoteRound1Message>();
        registry.register::<crate::messages::VoteRound2Message>();
        registry.register::<crate::messages::SyncRequestMessage>();
        registry.register::<crate::messages::StateTransferMessage>();
        registry.register::<crate::messages::SnapshotOfferMessage>();
        registry.register::<crate::messages::NewBatchMessage>();
        registry.register::<crate::messages::HeartBeatMessage>();
        registry
    }
}

/// Configuration for serialization
#[derive(Debug, Clone)]
pub struct SerializationConfig {
    pub use_binary: bool,
    pub compression_threshold: usize,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            use_binary: true,            // Default to binary for performance
            compression_threshold: 1024, // Compress only large messages
        }
    }
}

/// Factory for creating serializers based on configuration
pub struct SerializerFactory;

impl SerializerFactory {
    pub fn create(config: &SerializationConfig) -> Serializer {
        if config.use_binary {
            Serializer::Binary(BinarySerializer)
        } else {
            Serializer::Json(JsonSerializer)
        }
    }
}

/// Convenience functions for common serialization tasks
impl Serializer {
    /// Create a new JSON serializer
    pub fn json() -> Self {
        Self::Json(JsonSerializer)
    }

    /// Create a new binary serializer  
    pub fn binary() -> Self {
        Self::Binary(BinarySerializer)
    }

    /// Serialize a protocol message
    pub fn serialize_message(&self, message: &ProtocolMessage) -> Result<Vec<u8>> {
        self.serialize(message)
    }

    /// Deserialize a protocol message
    pub fn deserialize_message(&self, bytes: &[u8]) -> Result<ProtocolMessage> {
        self.deserialize(bytes)
    }

    /// Encodes `value` after checking it against `registry`. Returns
    /// `RabiaError::UnregisteredType` (a configuration error, fatal rather than
    /// retryable) if `T` was never registered.
    pub fn encode_checked<T>(&self, registry: &TypeRegistry, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + 'static,
    {
        if !registry.is_registered::<T>() {
            return Err(RabiaError::UnregisteredType {
                type_name: std::any::type_name::<T>().to_string(),
            });
        }
        self.serialize(value)
    }

    /// Decodes `bytes` into `T` after checking it against `registry`. Returns
    /// `RabiaError::UnregisteredType` if `T` was never registered.
    pub fn decode_checked<T>(&self, registry: &TypeRegistry, bytes: &[u8]) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + 'static,
    {
        if !registry.is_registered::<T>() {
            return Err(RabiaError::UnregisteredType {
                type_name: std::any::type_name::<T>().to_string(),
            });
        }
        self.deserialize(bytes)
    }

    /// Serialize a protocol message using pooled buffer (zero-allocation)
    pub fn serialize_message_pooled(&self, message: &ProtocolMessage) -> Result<PooledBuffer> {
        // Estimate size based on message type and content
        let estimated_size = estimate_message_size(message);
        let mut buffer = get_pooled_buffer(estimated_size);

        match self {
            Self::Json(serializer) => {
                let temp = serializer.serialize(message)?;
                buffer.buffer_mut().extend_from_slice(&temp);
            }
            Self::Binary(serializer) => {
                let temp = serializer.serialize(message)?;
                buffer.buffer_mut().extend_from_slice(&temp);
            }
        }

        Ok(buffer)
    }
}

/// Estimate the serialized size of a protocol message for buffer allocation
fn estimate_message_size(message: &ProtocolMessage) -> usize {
    use crate::messages::MessageType;

    let base_size = 128; // Base message overhead (IDs, timestamps, etc.)

    let payload_size = match &message.message_type {
        MessageType::Propose(propose) => 64 + propose.batch.commands.len() * 64,
        MessageType::R1(_) => 32,
        MessageType::R2(_) => 32,
        MessageType::SyncRequest(_) => 16,
        MessageType::StateTransfer(transfer) => 64 + transfer.decisions.len() * 80,
        MessageType::SnapshotOffer(_) => 256,
        MessageType::NewBatch(new_batch) => 32 + new_batch.batch.commands.len() * 64,
        MessageType::HeartBeat(_) => 24,
    };

    base_size + payload_size
}
