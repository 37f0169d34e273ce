//! End-to-end synchronization across live clients.
//!
//! Spins up an in-process board server and drives it through the real
//! client stack (net bridge, dispatcher, reconciler), asserting that
//! every mutation kind converges on all connected clients.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use boardsync::board::{Dispatcher, LocalCache, apply_event};
use boardsync::net::{NetCommand, NetConfig, NetEvent, spawn_net};
use boardsync_proto::task::{Task, TaskStatus};
use boardsync_proto::wire::{BoardEvent, ClientRequest, ErrorCode};
use boardsync_server::auth::StaticTokenAuth;
use boardsync_server::server::{ServerState, start_server};

/// Starts an in-process server with the demo identities.
async fn start_test_server() -> std::net::SocketAddr {
    let state = Arc::new(ServerState::new(StaticTokenAuth::demo()));
    let (addr, _handle) = start_server("127.0.0.1:0", state)
        .await
        .expect("failed to start test server");
    addr
}

/// One connected client: channel handles, local cache, dispatcher.
struct Client {
    cmd_tx: tokio::sync::mpsc::Sender<NetCommand>,
    evt_rx: tokio::sync::mpsc::Receiver<NetEvent>,
    cache: LocalCache,
    dispatcher: Dispatcher,
}

impl Client {
    /// Connects, authenticates, and applies the initial snapshot.
    async fn connect(addr: std::net::SocketAddr, token: &str) -> Self {
        let config = NetConfig::new(format!("ws://{addr}/ws"), token.to_string());
        let (cmd_tx, evt_rx, actor) = spawn_net(config).await.expect("connect failed");
        let mut client = Self {
            cmd_tx,
            evt_rx,
            cache: LocalCache::new(),
            dispatcher: Dispatcher::new(actor),
        };
        // Apply events up to and including the snapshot bulk.
        loop {
            let event = client.next_event().await;
            let is_snapshot = matches!(event, BoardEvent::TaskBulkUpdate { .. });
            apply_event(&mut client.cache, &event);
            if is_snapshot {
                break;
            }
        }
        client
    }

    /// Receives the next server event, with a test timeout.
    async fn next_event(&mut self) -> BoardEvent {
        let event = tokio::time::timeout(Duration::from_secs(2), self.evt_rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        match event {
            NetEvent::Board(event) => event,
            NetEvent::Disconnected => panic!("unexpected disconnect"),
        }
    }

    /// Receives the next event and merges it into the cache.
    async fn apply_next(&mut self) -> BoardEvent {
        let event = self.next_event().await;
        apply_event(&mut self.cache, &event);
        event
    }

    async fn send(&self, request: ClientRequest) {
        self.cmd_tx
            .send(NetCommand::Send(request))
            .await
            .expect("sync channel closed");
    }

    /// Creates a task and waits for its authoritative confirmation.
    async fn create_and_confirm(&mut self, title: &str) -> Task {
        let request = self
            .dispatcher
            .create_task(&mut self.cache, title)
            .expect("create rejected locally");
        self.send(request).await;
        loop {
            if let BoardEvent::TaskUpdate { task } = self.apply_next().await
                && task.title == title
            {
                return task;
            }
        }
    }

    fn column_titles(&self, status: TaskStatus) -> Vec<(String, u32)> {
        self.cache
            .column(status)
            .iter()
            .map(|t| (t.title.clone(), t.order))
            .collect()
    }
}

#[tokio::test]
async fn create_propagates_to_every_client() {
    let addr = start_test_server().await;
    let mut alice = Client::connect(addr, "alice-token").await;
    let mut bob = Client::connect(addr, "bob-token").await;

    let created = alice.create_and_confirm("Write the report").await;
    assert!(created.revision > 0);
    assert_eq!(alice.cache.len(), 1);

    bob.apply_next().await;
    assert_eq!(bob.column_titles(TaskStatus::Todo), alice.column_titles(TaskStatus::Todo));
}

#[tokio::test]
async fn move_converges_on_all_clients() {
    let addr = start_test_server().await;
    let mut alice = Client::connect(addr, "alice-token").await;

    let _a = alice.create_and_confirm("A").await;
    let b = alice.create_and_confirm("B").await;
    let _c = alice.create_and_confirm("C").await;

    let mut bob = Client::connect(addr, "bob-token").await;

    // Alice moves B to the top of done, optimistically first.
    let request = alice
        .dispatcher
        .move_task(&mut alice.cache, &b.id, TaskStatus::Done, 0)
        .expect("move rejected locally");
    assert_eq!(
        alice.column_titles(TaskStatus::Done),
        vec![("B".to_string(), 0)]
    );
    alice.send(request).await;

    // Both clients converge on the authoritative bulk.
    alice.apply_next().await;
    bob.apply_next().await;
    for client in [&alice, &bob] {
        assert_eq!(
            client.column_titles(TaskStatus::Todo),
            vec![("A".to_string(), 0), ("C".to_string(), 1)]
        );
        assert_eq!(
            client.column_titles(TaskStatus::Done),
            vec![("B".to_string(), 0)]
        );
    }
}

#[tokio::test]
async fn rejected_move_corrects_only_the_guesser() {
    let addr = start_test_server().await;
    let mut alice = Client::connect(addr, "alice-token").await;
    let task = alice.create_and_confirm("Owned by alice").await;

    let mut bob = Client::connect(addr, "bob-token").await;

    // Bob's advisory check would refuse this, so bypass the
    // dispatcher and send the raw request the way a stale or hostile
    // client would.
    bob.send(ClientRequest::TaskReorder {
        task_id: task.id.clone(),
        status: TaskStatus::Done,
        order: 0,
    })
    .await;

    let BoardEvent::Error { code, .. } = bob.apply_next().await else {
        panic!("expected rejection");
    };
    assert_eq!(code, ErrorCode::AuthorizationDenied);

    // The corrective bulk restores bob's view of the named columns.
    let BoardEvent::TaskBulkUpdate { .. } = bob.apply_next().await else {
        panic!("expected corrective bulk");
    };
    assert_eq!(
        bob.column_titles(TaskStatus::Todo),
        vec![("Owned by alice".to_string(), 0)]
    );
    assert!(bob.column_titles(TaskStatus::Done).is_empty());

    // Alice never saw the rejection: her next event is the next
    // ordinary commit.
    let marker = bob.create_and_confirm("Marker").await;
    let BoardEvent::TaskUpdate { task } = alice.apply_next().await else {
        panic!("expected marker update");
    };
    assert_eq!(task, marker);
}

#[tokio::test]
async fn delete_re_densifies_on_every_client() {
    let addr = start_test_server().await;
    let mut alice = Client::connect(addr, "alice-token").await;
    let _a = alice.create_and_confirm("A").await;
    let b = alice.create_and_confirm("B").await;
    let _c = alice.create_and_confirm("C").await;

    let mut admin = Client::connect(addr, "admin-token").await;

    // The administrator deletes B (allowed: owner-or-admin).
    let request = admin
        .dispatcher
        .delete_task(&mut admin.cache, &b.id)
        .expect("delete rejected locally");
    admin.send(request).await;

    // Both clients see the delete and the re-densified column.
    for client in [&mut alice, &mut admin] {
        loop {
            if let BoardEvent::TaskBulkUpdate { .. } = client.apply_next().await {
                break;
            }
        }
        assert_eq!(
            client.column_titles(TaskStatus::Todo),
            vec![("A".to_string(), 0), ("C".to_string(), 1)]
        );
    }
}

#[tokio::test]
async fn edit_title_propagates() {
    let addr = start_test_server().await;
    let mut alice = Client::connect(addr, "alice-token").await;
    let task = alice.create_and_confirm("Untitled").await;

    let mut bob = Client::connect(addr, "bob-token").await;

    let request = alice
        .dispatcher
        .edit_title(&mut alice.cache, &task.id, "Titled properly")
        .expect("edit rejected locally");
    alice.send(request).await;

    alice.apply_next().await;
    bob.apply_next().await;
    for client in [&alice, &bob] {
        assert_eq!(
            client.cache.get(&task.id).map(|t| t.title.as_str()),
            Some("Titled properly")
        );
    }
}

#[tokio::test]
async fn contiguity_holds_after_a_burst_of_concurrent_moves() {
    let addr = start_test_server().await;
    let mut alice = Client::connect(addr, "alice-token").await;
    let mut ids = Vec::new();
    for title in ["A", "B", "C", "D"] {
        ids.push(alice.create_and_confirm(title).await.id);
    }

    // Fire several cross-column reorders without waiting in between;
    // the server serializes them and emits one bulk per commit.
    for id in &ids {
        alice
            .send(ClientRequest::TaskReorder {
                task_id: id.clone(),
                status: TaskStatus::InProgress,
                order: 0,
            })
            .await;
    }
    for _ in 0..ids.len() {
        alice.apply_next().await;
    }

    for status in TaskStatus::ALL {
        let orders: Vec<u32> = alice
            .cache
            .column(status)
            .iter()
            .map(|t| t.order)
            .collect();
        let expected: Vec<u32> = (0..u32::try_from(orders.len()).unwrap()).collect();
        assert_eq!(orders, expected, "column {status} lost contiguity");
    }
    assert_eq!(alice.cache.len(), 4);
}
