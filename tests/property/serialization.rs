//! Property-based serialization round-trip tests.
//!
//! Uses proptest to verify:
//! 1. Any valid `Task` survives the JSON encode → decode round-trip.
//! 2. Any valid `BoardEvent` and `ClientRequest` round-trip.
//! 3. Arbitrary input never causes a panic in the decoders (they
//!    return `Err` gracefully).

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use uuid::Uuid;

use boardsync_proto::actor::Actor;
use boardsync_proto::task::{Task, TaskId, TaskStatus};
use boardsync_proto::wire::{self, BoardEvent, ClientRequest, ErrorCode};

// --- Strategies for protocol types ---

/// Strategy for generating arbitrary `TaskId` values.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    any::<u128>().prop_map(|n| TaskId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating arbitrary `TaskStatus` values.
fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
    ]
}

/// Strategy for titles and usernames (non-empty, control-char free).
fn arb_text() -> impl Strategy<Value = String> {
    "[^\\x00-\\x1f]{1,64}"
}

/// Strategy for generating arbitrary `Task` values.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        arb_text(),
        arb_status(),
        any::<u32>(),
        arb_text(),
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
    )
        .prop_map(
            |(id, title, status, order, owner, revision, created_at, updated_at)| Task {
                id,
                title,
                status,
                order,
                owner,
                revision,
                created_at,
                updated_at,
            },
        )
}

/// Strategy for generating arbitrary `Actor` values.
fn arb_actor() -> impl Strategy<Value = Actor> {
    (arb_text(), any::<bool>()).prop_map(|(username, is_admin)| Actor { username, is_admin })
}

/// Strategy for generating arbitrary `ErrorCode` values.
fn arb_error_code() -> impl Strategy<Value = ErrorCode> {
    prop_oneof![
        Just(ErrorCode::AuthenticationFailed),
        Just(ErrorCode::AuthorizationDenied),
        Just(ErrorCode::StaleReference),
        Just(ErrorCode::InvalidTitle),
        Just(ErrorCode::InvalidRequest),
    ]
}

/// Strategy for generating arbitrary `BoardEvent` values.
fn arb_event() -> impl Strategy<Value = BoardEvent> {
    prop_oneof![
        arb_actor().prop_map(|actor| BoardEvent::Connected { actor }),
        arb_task().prop_map(|task| BoardEvent::TaskUpdate { task }),
        (arb_task_id(), any::<u64>())
            .prop_map(|(task_id, revision)| BoardEvent::TaskDelete { task_id, revision }),
        (prop::collection::vec(arb_task(), 0..5), any::<u64>())
            .prop_map(|(tasks, revision)| BoardEvent::TaskBulkUpdate { tasks, revision }),
        (arb_error_code(), arb_text())
            .prop_map(|(code, reason)| BoardEvent::Error { code, reason }),
    ]
}

/// Strategy for generating arbitrary `ClientRequest` values.
fn arb_request() -> impl Strategy<Value = ClientRequest> {
    prop_oneof![
        arb_text().prop_map(|token| ClientRequest::Hello { token }),
        (arb_task_id(), arb_text(), arb_status(), any::<u32>()).prop_map(
            |(id, title, status, order)| ClientRequest::TaskCreate {
                id,
                title,
                status,
                order,
            }
        ),
        (arb_task_id(), arb_text())
            .prop_map(|(task_id, title)| ClientRequest::TaskEdit { task_id, title }),
        arb_task_id().prop_map(|task_id| ClientRequest::TaskDelete { task_id }),
        (arb_task_id(), arb_status(), any::<u32>()).prop_map(|(task_id, status, order)| {
            ClientRequest::TaskReorder {
                task_id,
                status,
                order,
            }
        }),
    ]
}

proptest! {
    #[test]
    fn task_round_trips_through_json(task in arb_task()) {
        let json = serde_json::to_string(&task).unwrap();
        let decoded: Task = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(task, decoded);
    }

    #[test]
    fn event_round_trips(event in arb_event()) {
        let json = wire::encode_event(&event).unwrap();
        let decoded = wire::decode_event(&json).unwrap();
        prop_assert_eq!(event, decoded);
    }

    #[test]
    fn request_round_trips(request in arb_request()) {
        let json = wire::encode_request(&request).unwrap();
        let decoded = wire::decode_request(&json).unwrap();
        prop_assert_eq!(request, decoded);
    }

    #[test]
    fn arbitrary_input_never_panics_event_decoder(input in ".{0,256}") {
        // Must return a Result, never panic.
        let _ = wire::decode_event(&input);
    }

    #[test]
    fn arbitrary_input_never_panics_request_decoder(input in ".{0,256}") {
        let _ = wire::decode_request(&input);
    }

    #[test]
    fn task_status_strings_are_stable(status in arb_status()) {
        // The wire string and the Display/FromStr pair must agree.
        let json = serde_json::to_string(&status).unwrap();
        prop_assert_eq!(json, format!("\"{status}\""));
        let parsed: TaskStatus = status.to_string().parse().unwrap();
        prop_assert_eq!(parsed, status);
    }
}
