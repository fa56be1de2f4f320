//! Tests for the task supervisor's start-together, stop-together protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

use up::{Result, Supervisor, UpError};

async fn succeed() -> Result<()> {
    Ok(())
}

async fn fail(error: UpError) -> Result<()> {
    Err(error)
}

async fn fail_when_cancelled(token: CancellationToken, error: UpError) -> Result<()> {
    token.cancelled().await;
    Err(error)
}

async fn explode() -> Result<()> {
    panic!("kaboom")
}

/// A task that runs until interrupted, counting interrupts.
struct Waiter {
    token: CancellationToken,
    interrupts: Arc<AtomicUsize>,
}

impl Waiter {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            interrupts: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn interrupts(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }

    fn add_to(&self, supervisor: &mut Supervisor, name: &str) {
        let token = self.token.clone();
        let interrupt_token = self.token.clone();
        let interrupts = self.interrupts.clone();
        supervisor.add(
            name,
            async move {
                token.cancelled().await;
                succeed().await
            },
            move || {
                interrupts.fetch_add(1, Ordering::SeqCst);
                interrupt_token.cancel();
            },
        );
    }
}

fn counting_interrupt(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
    let count = count.clone();
    move || {
        count.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn empty_supervisor_returns_ok() {
    let supervisor = Supervisor::new();
    assert!(supervisor.is_empty());
    supervisor.run().await.unwrap();
}

#[tokio::test]
async fn failing_task_interrupts_the_others_once() {
    let first = Waiter::new();
    let third = Waiter::new();
    let failed_interrupts = Arc::new(AtomicUsize::new(0));

    let mut supervisor = Supervisor::new();
    first.add_to(&mut supervisor, "first");
    supervisor.add(
        "second",
        fail(UpError::Configuration("bad config".into())),
        counting_interrupt(&failed_interrupts),
    );
    third.add_to(&mut supervisor, "third");
    assert_eq!(supervisor.len(), 3);

    let result = supervisor.run().await;

    assert!(matches!(result, Err(UpError::Configuration(ref m)) if m == "bad config"));
    assert_eq!(first.interrupts(), 1);
    assert_eq!(third.interrupts(), 1);
    assert_eq!(failed_interrupts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn clean_exit_stops_everything_without_error() {
    let waiter = Waiter::new();
    let done_interrupts = Arc::new(AtomicUsize::new(0));

    let mut supervisor = Supervisor::new();
    supervisor.add("done", succeed(), counting_interrupt(&done_interrupts));
    waiter.add_to(&mut supervisor, "waiter");

    supervisor.run().await.unwrap();

    assert_eq!(waiter.interrupts(), 1);
    assert_eq!(done_interrupts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn first_error_in_completion_order_wins() {
    let token = CancellationToken::new();
    let interrupt = token.clone();

    let mut supervisor = Supervisor::new();
    // Registered first, but only fails once interrupted.
    supervisor.add(
        "late",
        fail_when_cancelled(token, UpError::Http("late failure".into())),
        move || interrupt.cancel(),
    );
    supervisor.add(
        "early",
        fail(UpError::Http("early failure".into())),
        || {},
    );

    let result = supervisor.run().await;

    assert!(matches!(result, Err(UpError::Http(ref m)) if m == "early failure"));
}

#[tokio::test]
async fn late_error_after_clean_exit_is_reported() {
    let token = CancellationToken::new();
    let interrupt = token.clone();

    let mut supervisor = Supervisor::new();
    supervisor.add("done", succeed(), || {});
    supervisor.add(
        "verdict",
        fail_when_cancelled(
            token,
            UpError::ThresholdNotMet {
                threshold: 0.9,
                ratio: 0.5,
            },
        ),
        move || interrupt.cancel(),
    );

    let result = supervisor.run().await;

    assert!(matches!(result, Err(UpError::ThresholdNotMet { .. })));
}

#[tokio::test]
async fn panicking_task_is_reported_as_task_error() {
    let waiter = Waiter::new();

    let mut supervisor = Supervisor::new();
    waiter.add_to(&mut supervisor, "waiter");
    supervisor.add("boom", explode(), || {});

    let result = supervisor.run().await;

    match result {
        Err(UpError::Task { name, reason }) => {
            assert_eq!(name, "boom");
            assert!(reason.contains("kaboom"), "reason: {reason}");
        }
        other => panic!("expected task error, got {other:?}"),
    }
    assert_eq!(waiter.interrupts(), 1);
}
