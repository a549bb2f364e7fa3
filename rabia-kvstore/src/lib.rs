//! # Rabia KVStore
//!
//! The concrete replicated key-value state machine for a Rabia cluster (§4.G): `Put`,
//! `Get`, and `Remove` over structured keys, plus the non-consensus `Find` range query
//! and a change-notification bus.
//!
//! This crate does not run consensus itself; `KVStateMachine` implements
//! `rabia_core::StateMachine` and is meant to be handed to `rabia-engine`'s
//! `ReplicationDriver`.

pub mod notifications;
pub mod operations;
pub mod store;

pub use notifications::{
    ChangeNotification, ChangeType, KVNotificationBus, NotificationFilter, SubscriptionId,
};
pub use operations::{KVChangeEvent, KVCommand, KVCommandResult, StoreError};
pub use store::{KVStateMachine, KVStore, KVStoreConfig};

pub use rabia_core::{Command, CommandBatch, NodeId, StructuredKey, StructuredPattern};

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rabia_core::state_machine::StateMachine;

    #[tokio::test]
    async fn test_kvstore_basic_operations() {
        let store = KVStore::new(KVStoreConfig::default());
        let sm = store.state_machine();

        let put = KVCommand::Put {
            key: StructuredKey::new(["key1"]),
            value: Bytes::from_static(b"value1"),
        };
        sm.lock()
            .await
            .apply_command(&Command::new(put.encode().unwrap()))
            .await
            .unwrap();

        let remove = KVCommand::Remove {
            key: StructuredKey::new(["key1"]),
        };
        let response = sm
            .lock()
            .await
            .apply_command(&Command::new(remove.encode().unwrap()))
            .await
            .unwrap();
        let result = KVCommandResult::decode(&response).unwrap();
        assert_eq!(
            result,
            KVCommandResult::Remove {
                prior_value: Some(Bytes::from_static(b"value1"))
            }
        );

        assert!(store.is_empty().await);
    }
}
