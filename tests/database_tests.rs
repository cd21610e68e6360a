//! Public facade smoke tests

use siltdb::{Config, Database, SiltError, TxStatus};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tempfile::TempDir;

fn ephemeral_config() -> Config {
    let mut config = Config::default();
    config.enable_logging = false;
    config.enable_recovery = false;
    config.worker_threads = 2;
    config.epoch_duration_ms = 5;
    config
}

#[test]
fn test_open_transact_fence_drop() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with(dir.path(), ephemeral_config()).unwrap();

    let (sender, receiver) = mpsc::channel();
    db.execute_transaction(
        |tx| {
            assert!(tx.read("alice").is_none());
            tx.write("alice", b"1");
            assert_eq!(tx.read("alice"), Some(&b"1"[..]));
        },
        move |status| sender.send(status).unwrap(),
    )
    .unwrap();
    assert_eq!(
        receiver.recv_timeout(Duration::from_secs(10)).unwrap(),
        TxStatus::Committed
    );
    db.fence();
}

#[test]
fn test_both_protocols_through_the_facade() {
    for protocol in ["Silo", "SiloNWR", "SomethingUnknown"] {
        let dir = TempDir::new().unwrap();
        let mut config = ephemeral_config();
        config.concurrency_control_protocol = protocol.to_string();
        let db = Database::open_with(dir.path(), config).unwrap();

        let (sender, receiver) = mpsc::channel();
        let s = sender.clone();
        db.execute_transaction(
            |tx| tx.write("k", b"v"),
            move |status| s.send(status).unwrap(),
        )
        .unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(10)).unwrap(),
            TxStatus::Committed
        );

        db.execute_transaction(
            |tx| {
                let value = tx.read("k").map(|v| v.to_vec());
                assert_eq!(value.as_deref(), Some(&b"v"[..]));
            },
            move |status| sender.send(status).unwrap(),
        )
        .unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(10)).unwrap(),
            TxStatus::Committed
        );
    }
}

#[test]
fn test_callbacks_fire_for_every_submission() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with(dir.path(), ephemeral_config()).unwrap();

    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    for i in 0..100u32 {
        let count = Arc::clone(&count);
        db.execute_transaction(
            move |tx| tx.write(format!("k{}", i % 7), i.to_le_bytes()),
            move |_| {
                count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            },
        )
        .unwrap();
    }
    db.fence();
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 100);
}

#[test]
fn test_bad_config_file_surfaces_as_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("silt.toml"), "worker_threads = \"many\"").unwrap();
    let result = Database::open(dir.path());
    assert!(matches!(result, Err(SiltError::InvalidConfig(_))));
}

#[test]
fn test_reopen_with_durability() {
    let dir = TempDir::new().unwrap();
    let mut config = ephemeral_config();
    config.enable_logging = true;
    config.enable_recovery = true;

    {
        let db = Database::open_with(dir.path(), config.clone()).unwrap();
        let (sender, receiver) = mpsc::channel();
        db.execute_transaction(
            |tx| tx.write("persisted", b"yes"),
            move |status| sender.send(status).unwrap(),
        )
        .unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(10)).unwrap(),
            TxStatus::Committed
        );
        db.fence();
    }

    let db = Database::open_with(dir.path(), config).unwrap();
    let (sender, receiver) = mpsc::channel();
    db.execute_transaction(
        move |tx| {
            let value = tx.read("persisted").map(|v| v.to_vec());
            sender.send(value).unwrap();
        },
        |_| {},
    )
    .unwrap();
    assert_eq!(
        receiver
            .recv_timeout(Duration::from_secs(10))
            .unwrap()
            .as_deref(),
        Some(&b"yes"[..])
    );
}
