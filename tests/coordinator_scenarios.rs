//! Batch coordinator state-machine scenarios, driven through an in-memory
//! task store and a scripted deliverer.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use relay_core::error::{RelayError, Result};
use relay_core::models::TaskStatus;
use relay_core::scheduler::{
    AttemptOutcome, AttemptRecord, BackoffPolicy, BatchCoordinator, Deliverer, DeliveryRequest,
    DueTask, FailureKind, TaskStore,
};

#[derive(Debug, Clone)]
struct StoredTask {
    id: i64,
    url: String,
    event_type: String,
    payload: String,
    secret: Option<String>,
    attempts_made: i32,
    max_attempts: i32,
    status: TaskStatus,
    next_attempt_at: Option<DateTime<Utc>>,
    last_record: Option<AttemptRecord>,
    delivered_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
}

impl StoredTask {
    fn new(id: i64, attempts_made: i32, max_attempts: i32, due_at: DateTime<Utc>) -> Self {
        Self {
            id,
            url: "https://dest.example.com/hook".to_string(),
            event_type: "article.published".to_string(),
            payload: r#"{"articleId":42}"#.to_string(),
            secret: None,
            attempts_made,
            max_attempts,
            status: if attempts_made == 0 {
                TaskStatus::Pending
            } else {
                TaskStatus::RetryScheduled
            },
            next_attempt_at: Some(due_at),
            last_record: None,
            delivered_at: None,
            failed_at: None,
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    tasks: Mutex<Vec<StoredTask>>,
    fail_scan: bool,
    /// Fail every `mark_*` call for this task id, simulating a row whose
    /// state update cannot be persisted.
    fail_marks_for: Option<i64>,
}

impl MemoryStore {
    fn with_tasks(tasks: Vec<StoredTask>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            fail_scan: false,
            fail_marks_for: None,
        }
    }

    fn failing_scan() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            fail_scan: true,
            fail_marks_for: None,
        }
    }

    fn failing_marks_for(mut self, id: i64) -> Self {
        self.fail_marks_for = Some(id);
        self
    }

    fn check_mark(&self, id: i64) -> Result<()> {
        if self.fail_marks_for == Some(id) {
            return Err(RelayError::Configuration(
                "state update unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn get(&self, id: i64) -> StoredTask {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .expect("task exists")
    }

    fn update(&self, id: i64, f: impl FnOnce(&mut StoredTask)) {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.iter_mut().find(|t| t.id == id).expect("task exists");
        f(task);
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<DueTask>> {
        if self.fail_scan {
            return Err(RelayError::Configuration("scan unavailable".to_string()));
        }
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.status.is_terminal())
            .filter(|t| t.next_attempt_at.is_some_and(|at| at <= now))
            .map(|t| DueTask {
                id: t.id,
                url: t.url.clone(),
                event_type: t.event_type.clone(),
                payload: t.payload.clone(),
                secret: t.secret.clone(),
                attempts_made: t.attempts_made,
                max_attempts: t.max_attempts,
            })
            .collect())
    }

    async fn mark_succeeded(
        &self,
        id: i64,
        attempts_made: i32,
        record: &AttemptRecord,
        delivered_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_mark(id)?;
        self.update(id, |t| {
            t.status = TaskStatus::Succeeded;
            t.attempts_made = attempts_made;
            t.next_attempt_at = None;
            t.last_record = Some(record.clone());
            t.delivered_at = Some(delivered_at);
        });
        Ok(())
    }

    async fn mark_retry_scheduled(
        &self,
        id: i64,
        attempts_made: i32,
        next_attempt_at: DateTime<Utc>,
        record: &AttemptRecord,
    ) -> Result<()> {
        self.check_mark(id)?;
        self.update(id, |t| {
            t.status = TaskStatus::RetryScheduled;
            t.attempts_made = attempts_made;
            t.next_attempt_at = Some(next_attempt_at);
            t.last_record = Some(record.clone());
        });
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: i64,
        attempts_made: i32,
        record: &AttemptRecord,
        failed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_mark(id)?;
        self.update(id, |t| {
            t.status = TaskStatus::Failed;
            t.attempts_made = attempts_made;
            t.next_attempt_at = None;
            t.last_record = Some(record.clone());
            t.failed_at = Some(failed_at);
        });
        Ok(())
    }
}

/// Deliverer that plays back a fixed script of outcomes, one per attempt,
/// and records the requests it was handed.
struct ScriptedDeliverer {
    outcomes: Mutex<VecDeque<AttemptOutcome>>,
    requests: Mutex<Vec<DeliveryRequest>>,
}

impl ScriptedDeliverer {
    fn new(outcomes: Vec<AttemptOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliverer for ScriptedDeliverer {
    async fn attempt(&self, request: &DeliveryRequest) -> AttemptOutcome {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected delivery attempt")
    }
}

fn http_outcome(status: u16) -> AttemptOutcome {
    let ok = (200..300).contains(&status);
    AttemptOutcome {
        ok,
        http_status: Some(status),
        response_body: Some(format!("body for {status}")),
        duration_ms: 12,
        error_message: if ok {
            None
        } else {
            Some(format!("destination responded with HTTP {status}"))
        },
        failure_kind: None,
    }
}

fn transport_outcome(kind: FailureKind) -> AttemptOutcome {
    AttemptOutcome {
        ok: false,
        http_status: None,
        response_body: None,
        duration_ms: 30_000,
        error_message: Some(format!("transport failure: {kind}")),
        failure_kind: Some(kind),
    }
}

fn coordinator(
    store: MemoryStore,
    outcomes: Vec<AttemptOutcome>,
) -> BatchCoordinator<MemoryStore, ScriptedDeliverer> {
    BatchCoordinator::new(
        store,
        ScriptedDeliverer::new(outcomes),
        BackoffPolicy::default(),
        Duration::ZERO,
    )
}

fn store_of(coordinator: &BatchCoordinator<MemoryStore, ScriptedDeliverer>) -> &MemoryStore {
    coordinator.store()
}

#[tokio::test]
async fn server_error_schedules_retry_with_doubled_delay() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![StoredTask::new(1, 0, 3, now)]);
    let coord = coordinator(store, vec![http_outcome(503)]);

    let summary = coord.run_pass(now).await.expect("pass runs");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);

    let task = store_of(&coord).get(1);
    assert_eq!(task.status, TaskStatus::RetryScheduled);
    assert_eq!(task.attempts_made, 1);
    // Delay is keyed off the upcoming attempt: 30 * 2^1 = 60s.
    assert_eq!(task.next_attempt_at, Some(now + chrono::Duration::seconds(60)));
    let record = task.last_record.expect("outcome recorded");
    assert_eq!(record.http_status, Some(503));
}

#[tokio::test]
async fn client_error_fails_immediately_despite_attempts_remaining() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![StoredTask::new(1, 0, 3, now)]);
    let coord = coordinator(store, vec![http_outcome(404)]);

    coord.run_pass(now).await.expect("pass runs");

    let task = store_of(&coord).get(1);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempts_made, 1);
    assert_eq!(task.next_attempt_at, None);
    assert_eq!(task.failed_at, Some(now));
}

#[tokio::test]
async fn retryable_error_on_final_attempt_is_terminal() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![StoredTask::new(1, 2, 3, now)]);
    let coord = coordinator(store, vec![http_outcome(500)]);

    coord.run_pass(now).await.expect("pass runs");

    let task = store_of(&coord).get(1);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempts_made, 3);
    assert_eq!(task.next_attempt_at, None);
}

#[tokio::test]
async fn success_records_response_metadata() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![StoredTask::new(1, 0, 3, now)]);
    let coord = coordinator(store, vec![http_outcome(200)]);

    let summary = coord.run_pass(now).await.expect("pass runs");
    assert_eq!(summary.succeeded, 1);

    let task = store_of(&coord).get(1);
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.attempts_made, 1);
    assert_eq!(task.next_attempt_at, None);
    assert_eq!(task.delivered_at, Some(now));
    let record = task.last_record.expect("outcome recorded");
    assert_eq!(record.http_status, Some(200));
    assert_eq!(record.response_body.as_deref(), Some("body for 200"));
    assert_eq!(record.duration_ms, 12);
}

#[tokio::test]
async fn timeout_is_retryable() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![StoredTask::new(1, 0, 3, now)]);
    let coord = coordinator(store, vec![transport_outcome(FailureKind::Timeout)]);

    coord.run_pass(now).await.expect("pass runs");

    let task = store_of(&coord).get(1);
    assert_eq!(task.status, TaskStatus::RetryScheduled);
    assert_eq!(task.attempts_made, 1);
}

#[tokio::test]
async fn attempts_never_exceed_budget_and_terminal_tasks_stay_terminal() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![StoredTask::new(1, 0, 3, now)]);
    let coord = coordinator(
        store,
        vec![http_outcome(503), http_outcome(503), http_outcome(503)],
    );

    // Walk the task through its whole attempt budget, advancing past each
    // scheduled retry time.
    let mut at = now;
    for _ in 0..3 {
        coord.run_pass(at).await.expect("pass runs");
        let task = store_of(&coord).get(1);
        assert!(task.attempts_made <= task.max_attempts);
        if let Some(next) = task.next_attempt_at {
            at = next;
        }
    }

    let task = store_of(&coord).get(1);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempts_made, 3);

    // Terminal task is never selected again, even far in the future.
    let summary = coord
        .run_pass(at + chrono::Duration::days(30))
        .await
        .expect("pass runs");
    assert_eq!(summary.processed, 0);
}

#[tokio::test]
async fn second_pass_with_no_new_due_tasks_processes_nothing() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![
        StoredTask::new(1, 0, 3, now),
        StoredTask::new(2, 0, 3, now),
    ]);
    let coord = coordinator(store, vec![http_outcome(200), http_outcome(503)]);

    let first = coord.run_pass(now).await.expect("pass runs");
    assert_eq!(first.processed, 2);

    // Task 1 is terminal, task 2 is scheduled for now + 60s: nothing is due.
    let second = coord.run_pass(now).await.expect("pass runs");
    assert_eq!(second.processed, 0);
}

#[tokio::test]
async fn exhausted_task_in_due_set_is_failed_defensively() {
    let now = Utc::now();
    let mut stale = StoredTask::new(1, 3, 3, now);
    stale.status = TaskStatus::RetryScheduled;
    let store = MemoryStore::with_tasks(vec![stale]);
    // No scripted outcome: the deliverer must not be called at all.
    let coord = coordinator(store, vec![]);

    let summary = coord.run_pass(now).await.expect("pass runs");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    let task = store_of(&coord).get(1);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempts_made, 3);
    let record = task.last_record.expect("outcome recorded");
    assert_eq!(record.error_message.as_deref(), Some("max attempts exceeded"));
}

#[tokio::test]
async fn persist_failure_is_contained_and_remaining_tasks_still_process() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![
        StoredTask::new(1, 0, 3, now),
        StoredTask::new(2, 0, 3, now),
    ])
    .failing_marks_for(1);
    let coord = coordinator(store, vec![http_outcome(503), http_outcome(200)]);

    let summary = coord.run_pass(now).await.expect("pass still completes");
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    // Task 1's state update failed, so its row is untouched and stays due
    // for the next invocation.
    let stuck = store_of(&coord).get(1);
    assert_eq!(stuck.status, TaskStatus::Pending);
    assert_eq!(stuck.attempts_made, 0);
    assert!(stuck.last_record.is_none());

    let delivered = store_of(&coord).get(2);
    assert_eq!(delivered.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn delivery_request_carries_stored_payload_unmodified() {
    let now = Utc::now();
    let task = StoredTask::new(1, 0, 3, now);
    let stored_payload = task.payload.clone();
    let store = MemoryStore::with_tasks(vec![task]);
    let coord = coordinator(store, vec![http_outcome(200)]);

    coord.run_pass(now).await.expect("pass runs");

    let requests = coord.deliverer().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].payload, stored_payload);
    assert_eq!(requests[0].url, "https://dest.example.com/hook");
    assert_eq!(requests[0].event_type, "article.published");
}

#[tokio::test]
async fn scan_failure_propagates_as_whole_pass_error() {
    let coord = coordinator(MemoryStore::failing_scan(), vec![]);
    let result = coord.run_pass(Utc::now()).await;
    assert!(result.is_err());
}
