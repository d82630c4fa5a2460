//! Background task runner.
//!
//! A long-running operation runs on its own OS thread and reports through a
//! one-way unbounded channel. The control thread drains the channel once per
//! tick without blocking. Every task ends with exactly one
//! [`TaskEvent::Finished`], whether it succeeds, fails or panics.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

use hexcore_common::Result;

/// Number of characters of a panic message kept in the banner.
const PANIC_BANNER_LEN: usize = 20;

/// Message emitted by a running task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Completed fraction in `[0, 1]`, never decreasing within one task.
    Progress(f32),
    /// Informational log line.
    Log(String),
    /// Status banner for the user.
    Important(String),
    /// Terminal marker, sent once.
    Finished,
}

/// Producer side handed to the task body.
pub struct TaskReporter {
    tx: UnboundedSender<TaskEvent>,
    last_progress: Cell<f32>,
}

impl TaskReporter {
    fn new(tx: UnboundedSender<TaskEvent>) -> Self {
        Self {
            tx,
            last_progress: Cell::new(0.0),
        }
    }

    /// Report progress, clamped to `[0, 1]`. Values below the last report are
    /// raised to it.
    pub fn progress(&self, fraction: f32) {
        let clamped = if fraction.is_nan() {
            self.last_progress.get()
        } else {
            fraction.clamp(0.0, 1.0).max(self.last_progress.get())
        };
        self.last_progress.set(clamped);
        self.send(TaskEvent::Progress(clamped));
    }

    /// Emit a log line.
    pub fn log(&self, line: impl Into<String>) {
        self.send(TaskEvent::Log(line.into()));
    }

    /// Emit a status banner.
    pub fn important(&self, banner: impl Into<String>) {
        self.send(TaskEvent::Important(banner.into()));
    }

    fn send(&self, event: TaskEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

struct FinishGuard(UnboundedSender<TaskEvent>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let _ = self.0.send(TaskEvent::Finished);
    }
}

/// Consumer side of a spawned task.
pub struct TaskHandle {
    rx: UnboundedReceiver<TaskEvent>,
    thread: Option<JoinHandle<()>>,
    finished: bool,
}

impl TaskHandle {
    /// Take every event queued so far without waiting.
    pub fn drain(&mut self) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if event == TaskEvent::Finished {
                        self.finished = true;
                    }
                    events.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Whether [`TaskEvent::Finished`] has been drained.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Block until the task ends and return every remaining event.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(mut self) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.blocking_recv() {
            let done = event == TaskEvent::Finished;
            events.push(event);
            if done {
                break;
            }
        }
        self.finished = true;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        events
    }
}

/// Run `body` on a dedicated thread named `name`.
///
/// # Errors
/// - I/O error if the OS refuses to spawn the thread
pub fn spawn_task<F>(name: &str, body: F) -> Result<TaskHandle>
where
    F: FnOnce(&TaskReporter) + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task_name = name.to_string();

    let thread = thread::Builder::new()
        .name(format!("hexcore-{}", name))
        .spawn(move || {
            let _finish = FinishGuard(tx.clone());
            let reporter = TaskReporter::new(tx);
            debug!(task = %task_name, "Task started");

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| body(&reporter))) {
                let message = panic_message(payload.as_ref());
                error!(task = %task_name, panic = %message, "Task panicked");
                let short: String = message.chars().take(PANIC_BANNER_LEN).collect();
                reporter.important(format!("CRITICAL ERROR: {}", short));
            }
            debug!(task = %task_name, "Task ended");
        })?;

    Ok(TaskHandle {
        rx,
        thread: Some(thread),
        finished: false,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
