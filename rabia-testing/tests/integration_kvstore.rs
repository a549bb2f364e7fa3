//! KVStore integration tests
//!
//! These tests verify the key-value store functionality
//! and its integration with the consensus protocol.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use bytes::Bytes;
use rabia_core::{state_machine::StateMachine, Command, StructuredKey};
use rabia_kvstore::{KVCommand, KVCommandResult, KVStore, KVStoreConfig};

async fn put(store: &KVStore, key: &str, value: &str) {
    let cmd = KVCommand::Put {
        key: StructuredKey::new([key]),
        value: Bytes::from(value.to_string()),
    };
    store
        .state_machine()
        .lock()
        .await
        .apply_command(&Command::new(cmd.encode().unwrap()))
        .await
        .expect("put failed");
}

async fn get(store: &KVStore, key: &str) -> Option<Bytes> {
    let cmd = KVCommand::Get {
        key: StructuredKey::new([key]),
    };
    let response = store
        .state_machine()
        .lock()
        .await
        .apply_command(&Command::new(cmd.encode().unwrap()))
        .await
        .expect("get failed");
    match KVCommandResult::decode(&response).unwrap() {
        KVCommandResult::Get { value } => value,
        other => panic!("unexpected result for Get: {:?}", other),
    }
}

async fn remove(store: &KVStore, key: &str) -> Option<Bytes> {
    let cmd = KVCommand::Remove {
        key: StructuredKey::new([key]),
    };
    let response = store
        .state_machine()
        .lock()
        .await
        .apply_command(&Command::new(cmd.encode().unwrap()))
        .await
        .expect("remove failed");
    match KVCommandResult::decode(&response).unwrap() {
        KVCommandResult::Remove { prior_value } => prior_value,
        other => panic!("unexpected result for Remove: {:?}", other),
    }
}

/// Test basic KVStore operations
#[tokio::test]
async fn test_kvstore_basic_operations() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let config = KVStoreConfig {
        max_keys: 1000,
        ..Default::default()
    };
    let store = KVStore::new(config);

    put(&store, "key1", "value1").await;

    let value = get(&store, "key1").await;
    assert_eq!(value, Some(Bytes::from_static(b"value1")));

    let value = get(&store, "nonexistent").await;
    assert_eq!(value, None, "non-existent key should return None");

    let prior = remove(&store, "key1").await;
    assert_eq!(prior, Some(Bytes::from_static(b"value1")));

    let value = get(&store, "key1").await;
    assert_eq!(value, None, "deleted key should return None");
}

/// Test applying a sequence of KVCommands as a batch-like run
#[tokio::test]
async fn test_kvstore_batch_operations() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let config = KVStoreConfig {
        max_keys: 1000,
        ..Default::default()
    };
    let store = KVStore::new(config);

    for i in 1..=3 {
        put(
            &store,
            &format!("batch_key{}", i),
            &format!("batch_value{}", i),
        )
        .await;
    }

    for i in 1..=3 {
        let key = format!("batch_key{}", i);
        let expected_value = Bytes::from(format!("batch_value{}", i));

        let value = get(&store, &key).await;
        assert_eq!(value, Some(expected_value), "batch key {} value mismatch", key);
    }
}

/// Test KVStore with concurrent operations through a shared state machine handle
#[tokio::test]
async fn test_kvstore_concurrent_operations() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let config = KVStoreConfig {
        max_keys: 1000,
        ..Default::default()
    };
    let store = Arc::new(KVStore::new(config));

    let mut handles = Vec::new();

    for i in 0..10 {
        let store = store.clone();
        let handle = tokio::spawn(async move {
            let key = format!("concurrent_key_{}", i);
            let value = format!("concurrent_value_{}", i);

            put(&store, &key, &value).await;
            let result = get(&store, &key).await;
            assert_eq!(
                result,
                Some(Bytes::from(value)),
                "concurrent operation {} value mismatch",
                i
            );
        });
        handles.push(handle);
    }

    for handle in handles {
        let result = timeout(Duration::from_secs(5), handle).await;
        assert!(result.is_ok(), "concurrent operation timed out");
        assert!(result.unwrap().is_ok(), "concurrent operation panicked");
    }

    for i in 0..10 {
        let key = format!("concurrent_key_{}", i);
        let expected_value = format!("concurrent_value_{}", i);

        let value = get(&store, &key).await;
        assert_eq!(
            value,
            Some(Bytes::from(expected_value)),
            "final value mismatch for key {}",
            i
        );
    }
}

/// Test KVStore throughput under load
#[tokio::test]
async fn test_kvstore_performance() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let config = KVStoreConfig {
        max_keys: 10000,
        ..Default::default()
    };
    let store = KVStore::new(config);

    let start_time = std::time::Instant::now();
    let operation_count = 1000;

    for i in 0..operation_count {
        let key = format!("perf_key_{}", i);
        let value = format!("perf_value_{}", i);

        put(&store, &key, &value).await;

        if i % 100 == 0 {
            let _ = get(&store, &key).await;
        }
    }

    let duration = start_time.elapsed();
    let ops_per_sec = operation_count as f64 / duration.as_secs_f64();

    println!(
        "KVStore performance: {} operations in {:?} ({:.2} ops/sec)",
        operation_count, duration, ops_per_sec
    );

    assert!(
        ops_per_sec > 100.0,
        "performance too low: {:.2} ops/sec",
        ops_per_sec
    );
}

/// Test client-side validation: capacity limits, empty keys, oversized values
#[tokio::test]
async fn test_kvstore_error_handling() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let config = KVStoreConfig {
        max_keys: 2,
        max_value_size: 16,
    };
    let store = KVStore::new(config);

    for i in 0..2 {
        let key = StructuredKey::new([format!("key_{}", i)]);
        assert!(store.can_accept_new_key(&key, i).is_ok());
        put(&store, &format!("key_{}", i), &format!("value_{}", i)).await;
    }

    // Capacity is enforced client-side before a command is ever proposed; the
    // state machine itself has no notion of `max_keys`.
    let overflow_key = StructuredKey::new(["overflow_key"]);
    let current_len = store.len().await;
    assert!(
        store.can_accept_new_key(&overflow_key, current_len).is_err(),
        "store should refuse new keys once at capacity"
    );

    let empty_key = StructuredKey::new(Vec::<String>::new());
    assert!(
        store.validate_key(&empty_key).is_err(),
        "empty key should fail validation"
    );

    let oversized_value = Bytes::from(vec![0u8; 1024]);
    assert!(
        store.validate_value(&oversized_value).is_err(),
        "value exceeding max_value_size should fail validation"
    );
}

/// Test KVStore with mixed operation types
#[tokio::test]
async fn test_kvstore_mixed_operations() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let config = KVStoreConfig {
        max_keys: 1000,
        ..Default::default()
    };
    let store = KVStore::new(config);

    for i in 0..10 {
        put(
            &store,
            &format!("mixed_key_{}", i),
            &format!("initial_value_{}", i),
        )
        .await;
    }

    for i in 0..10 {
        let key = format!("mixed_key_{}", i);
        match i % 3 {
            0 => put(&store, &key, &format!("updated_value_{}", i)).await,
            1 => {
                remove(&store, &key).await;
            }
            2 => {
                let value = get(&store, &key).await;
                assert_eq!(value, Some(Bytes::from(format!("initial_value_{}", i))));
            }
            _ => unreachable!(),
        }
    }

    for i in 0..10 {
        let key = format!("mixed_key_{}", i);
        let value = get(&store, &key).await;

        match i % 3 {
            0 => assert_eq!(value, Some(Bytes::from(format!("updated_value_{}", i)))),
            1 => assert_eq!(value, None),
            2 => assert_eq!(value, Some(Bytes::from(format!("initial_value_{}", i)))),
            _ => unreachable!(),
        }
    }
}
