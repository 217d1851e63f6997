// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure

//! Watch sessions driven by remote changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tagtree::{tagged, Client, ClientConfig, Error, MemoryStore, TreeStore};
use tokio::sync::mpsc;

#[derive(Debug, Default, Clone, PartialEq)]
struct Limits {
    max_conn: i32,
    burst: i64,
}
tagged!(Limits {
    max_conn => "/max_conn",
    burst => "/burst",
});

#[derive(Debug, Default, Clone, PartialEq)]
struct Settings {
    name: String,
    limits: Limits,
    peers: Vec<String>,
    labels: Option<HashMap<String, String>>,
}
tagged!(Settings {
    name => "/name",
    limits => "/limits",
    peers => "/peers",
    labels => "/labels",
});

fn settings() -> Settings {
    Settings {
        name: "alpha".into(),
        limits: Limits {
            max_conn: 10,
            burst: 100,
        },
        peers: vec!["a".into()],
        labels: Some(HashMap::from([("env".to_string(), "dev".to_string())])),
    }
}

fn notifier() -> (
    mpsc::UnboundedSender<()>,
    mpsc::UnboundedReceiver<()>,
) {
    mpsc::unbounded_channel()
}

async fn next(rx: &mut mpsc::UnboundedReceiver<()>) {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("callback did not fire")
        .expect("watch ended");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_refills_scalar() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(ClientConfig::default(), Arc::clone(&store), settings()).unwrap();
    client.save().unwrap();

    let (tx, mut rx) = notifier();
    let name = client.field("/name").unwrap();
    let handle = client
        .watch(name, move || {
            let _ = tx.send(());
        })
        .unwrap();

    store.set("/name", "beta", 0).unwrap();
    next(&mut rx).await;

    assert_eq!(client.read().name, "beta");
    let version = client.version(name).unwrap();
    assert_eq!(version, store.index());

    handle.cancel().await;
}

#[tokio::test]
async fn test_watch_nested_struct() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(ClientConfig::default(), Arc::clone(&store), settings()).unwrap();
    client.save().unwrap();

    let (tx, mut rx) = notifier();
    let limits = client.field("/limits").unwrap();
    let handle = client
        .watch(limits, move || {
            let _ = tx.send(());
        })
        .unwrap();
    assert_eq!(handle.path(), "/limits");

    store.set("/limits/max_conn", "64", 0).unwrap();
    next(&mut rx).await;

    let current = client.read().limits.clone();
    assert_eq!(current.max_conn, 64);
    assert_eq!(current.burst, 100);

    handle.cancel().await;
}

#[tokio::test]
async fn test_watch_sequence_and_map() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(ClientConfig::default(), Arc::clone(&store), settings()).unwrap();
    client.save().unwrap();

    let (tx, mut rx) = notifier();
    let peers = client.field("/peers").unwrap();
    let peers_handle = client
        .watch(peers, move || {
            let _ = tx.send(());
        })
        .unwrap();

    store.create_in_order("/peers", "b", 0).unwrap();
    next(&mut rx).await;
    assert_eq!(client.read().peers, vec!["a", "b"]);
    peers_handle.cancel().await;

    let (tx, mut rx) = notifier();
    let labels = client.field("/labels").unwrap();
    let labels_handle = client
        .watch(labels, move || {
            let _ = tx.send(());
        })
        .unwrap();

    store.set("/labels/owner", "ops", 0).unwrap();
    next(&mut rx).await;
    let labels = client.read().labels.clone().unwrap_or_default();
    assert_eq!(labels.get("owner").map(String::as_str), Some("ops"));
    assert_eq!(labels.get("env").map(String::as_str), Some("dev"));

    labels_handle.cancel().await;
}

#[tokio::test]
async fn test_watch_resumes_after_loaded_version() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(ClientConfig::default(), Arc::clone(&store), settings()).unwrap();
    client.save().unwrap();
    client.load().unwrap();

    // Changed after the load but before the watch starts.
    store.set("/name", "missed", 0).unwrap();

    let (tx, mut rx) = notifier();
    let name = client.field("/name").unwrap();
    let handle = client
        .watch(name, move || {
            let _ = tx.send(());
        })
        .unwrap();

    next(&mut rx).await;
    assert_eq!(client.read().name, "missed");

    handle.cancel().await;
}

#[tokio::test]
async fn test_loaded_directories_do_not_replay() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(ClientConfig::default(), Arc::clone(&store), settings()).unwrap();
    client.save().unwrap();
    client.load().unwrap();

    let (tx, mut rx) = notifier();
    let mut handles = Vec::new();
    for path in ["/limits", "/labels", "/peers"] {
        let id = client.field(path).unwrap();
        let newest = store.get(path, true, true).unwrap().node.newest_index();
        assert_eq!(client.version(id).unwrap(), newest, "{}", path);

        let tx = tx.clone();
        handles.push(
            client
                .watch(id, move || {
                    let _ = tx.send(());
                })
                .unwrap(),
        );
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    store.set("/limits/burst", "5", 0).unwrap();
    next(&mut rx).await;
    assert_eq!(client.read().limits.burst, 5);
    let limits = client.field("/limits").unwrap();
    assert_eq!(client.version(limits).unwrap(), store.index());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    for handle in handles {
        handle.cancel().await;
    }
}

#[tokio::test]
async fn test_cancel_stops_callbacks() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(ClientConfig::default(), Arc::clone(&store), settings()).unwrap();
    client.save().unwrap();

    let (tx, mut rx) = notifier();
    let name = client.field("/name").unwrap();
    let handle = client
        .watch(name, move || {
            let _ = tx.send(());
        })
        .unwrap();

    store.set("/name", "one", 0).unwrap();
    next(&mut rx).await;

    handle.cancel().await;
    store.set("/name", "two", 0).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(client.read().name, "one");
    assert_eq!(store.watcher_count(), 0);
}

#[tokio::test]
async fn test_watch_root_with_namespace() {
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig::builder().namespace("/svc").build();
    let client = Client::new(config, Arc::clone(&store), settings()).unwrap();
    client.save().unwrap();

    let (tx, mut rx) = notifier();
    let handle = client
        .watch(client.root(), move || {
            let _ = tx.send(());
        })
        .unwrap();
    assert_eq!(handle.path(), "/svc");

    store.set("/other", "ignored", 0).unwrap();
    store.set("/svc/limits/burst", "7", 0).unwrap();
    next(&mut rx).await;

    let current = client.read().clone();
    assert_eq!(current.limits.burst, 7);
    assert_eq!(current.name, "alpha");

    handle.cancel().await;
}

#[tokio::test]
async fn test_watch_unaddressable_field() {
    #[derive(Debug, Default)]
    struct Fleet {
        nodes: Vec<Limits>,
    }
    tagged!(Fleet { nodes => "/nodes" });

    let store = Arc::new(MemoryStore::new());
    let client = Client::new(
        ClientConfig::default(),
        Arc::clone(&store),
        Fleet {
            nodes: vec![Limits::default()],
        },
    )
    .unwrap();
    client.save().unwrap();

    assert!(matches!(
        client.field("/nodes/0/max_conn"),
        Err(Error::FieldNotAddr(_))
    ));
    assert!(matches!(
        client.field("/nodes/0/unknown"),
        Err(Error::FieldNotMapped(_))
    ));
    assert_eq!(store.watcher_count(), 0);
}
