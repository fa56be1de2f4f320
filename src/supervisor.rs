//! Lifecycle supervision for the long-running tasks.
//!
//! A [`Supervisor`] owns an ordered set of tasks, each an `execute` future
//! paired with an `interrupt` callback. All tasks start together. As soon as
//! one of them returns, with or without an error, every other task is
//! interrupted exactly once and the supervisor waits for all of them to
//! return. Tasks never need to know about each other.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::{Result, UpError};

type Interrupt = Box<dyn FnOnce() + Send + 'static>;

struct Task {
    name: String,
    execute: BoxFuture<'static, Result<()>>,
    interrupt: Interrupt,
}

/// Starts tasks together and stops them together.
#[derive(Default)]
pub struct Supervisor {
    tasks: Vec<Task>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task.
    ///
    /// `interrupt` must make `execute` return promptly. It may be called
    /// after `execute` has already returned on its own, and must tolerate
    /// that.
    pub fn add<F, I>(&mut self, name: impl Into<String>, execute: F, interrupt: I)
    where
        F: Future<Output = Result<()>> + Send + 'static,
        I: FnOnce() + Send + 'static,
    {
        self.tasks.push(Task {
            name: name.into(),
            execute: execute.boxed(),
            interrupt: Box::new(interrupt),
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run all tasks until the first one returns, interrupt the rest, and
    /// wait for every task to finish.
    ///
    /// Returns the first error in completion order, if any task failed. A
    /// panicking task counts as failed.
    pub async fn run(self) -> Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        let mut set = JoinSet::new();
        let mut names = Vec::with_capacity(self.tasks.len());
        let mut interrupts: Vec<Option<Interrupt>> = Vec::with_capacity(self.tasks.len());

        for (index, task) in self.tasks.into_iter().enumerate() {
            let name = task.name.clone();
            set.spawn(async move {
                let result = AssertUnwindSafe(task.execute)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(UpError::Task {
                            name: task.name,
                            reason: panic_message(panic.as_ref()),
                        })
                    });
                (index, result)
            });
            names.push(name);
            interrupts.push(Some(task.interrupt));
        }

        let mut first_error: Option<UpError> = None;

        if let Some(joined) = set.join_next().await {
            let (index, result) = flatten(joined);
            let name = names.get(index).map_or("unknown", String::as_str);
            match &result {
                Ok(()) => info!(task = name, "task finished, interrupting the others"),
                Err(e) => error!(task = name, error = %e, "task failed, interrupting the others"),
            }
            if let Some(done) = interrupts.get_mut(index) {
                done.take();
            }
            record_error(&mut first_error, result);

            for (index, interrupt) in interrupts.iter_mut().enumerate() {
                if let Some(interrupt) = interrupt.take() {
                    debug!(task = %names[index], "interrupting task");
                    interrupt();
                }
            }
        }

        while let Some(joined) = set.join_next().await {
            let (index, result) = flatten(joined);
            let name = names.get(index).map_or("unknown", String::as_str);
            match &result {
                Ok(()) => debug!(task = name, "task stopped"),
                Err(e) => error!(task = name, error = %e, "task stopped with error"),
            }
            record_error(&mut first_error, result);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn flatten(
    joined: std::result::Result<(usize, Result<()>), tokio::task::JoinError>,
) -> (usize, Result<()>) {
    // Panics are caught inside the task; a join error here means the task
    // was aborted, which only happens when the runtime shuts down.
    joined.unwrap_or_else(|e| {
        (
            usize::MAX,
            Err(UpError::Task {
                name: "unknown".into(),
                reason: e.to_string(),
            }),
        )
    })
}

fn record_error(first: &mut Option<UpError>, result: Result<()>) {
    if let Err(e) = result {
        first.get_or_insert(e);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
