//! Progress tracking and reporting for resolution and install tasks

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Progress callback shared by every task of a run
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted by pipeline tasks
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        task: u64,
        title: String,
        info: String,
    },
    Title {
        task: u64,
        title: String,
    },
    Message {
        task: u64,
        message: String,
    },
    Indeterminate {
        task: u64,
        indeterminate: bool,
    },
    Steps {
        task: u64,
        total: usize,
    },
    Step {
        task: u64,
    },
    Bytes {
        task: u64,
        downloaded: u64,
        total: Option<u64>,
    },
    Done {
        task: u64,
    },
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Per-task progress handle
pub struct TaskProgress {
    id: u64,
    callback: ProgressCallback,
    done: AtomicBool,
}

impl std::fmt::Debug for TaskProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProgress")
            .field("id", &self.id)
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish()
    }
}

impl TaskProgress {
    pub fn start<T: Into<String>, I: Into<String>>(callback: ProgressCallback, title: T, info: I) -> Self {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        callback(ProgressEvent::Started {
            task: id,
            title: title.into(),
            info: info.into(),
        });
        Self {
            id,
            callback,
            done: AtomicBool::new(false),
        }
    }

    /// Handle that reports nowhere
    pub fn detached() -> Self {
        Self::start(NullProgressReporter.into_callback(), "", "")
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn title<S: Into<String>>(&self, title: S) {
        (self.callback)(ProgressEvent::Title {
            task: self.id,
            title: title.into(),
        });
    }

    pub fn message<S: Into<String>>(&self, message: S) {
        (self.callback)(ProgressEvent::Message {
            task: self.id,
            message: message.into(),
        });
    }

    pub fn indeterminate(&self, indeterminate: bool) {
        (self.callback)(ProgressEvent::Indeterminate {
            task: self.id,
            indeterminate,
        });
    }

    pub fn set_steps(&self, total: usize) {
        (self.callback)(ProgressEvent::Steps { task: self.id, total });
    }

    pub fn step(&self) {
        (self.callback)(ProgressEvent::Step { task: self.id });
    }

    pub fn bytes(&self, downloaded: u64, total: Option<u64>) {
        (self.callback)(ProgressEvent::Bytes {
            task: self.id,
            downloaded,
            total,
        });
    }

    /// Signal completion; only the first call emits an event
    pub fn done(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            (self.callback)(ProgressEvent::Done { task: self.id });
        }
    }

    /// Owned handle for posting messages from blocking sections
    pub fn sender(&self) -> MessageSender {
        MessageSender {
            task: self.id,
            callback: self.callback.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MessageSender {
    task: u64,
    callback: ProgressCallback,
}

impl MessageSender {
    pub fn message<S: Into<String>>(&self, message: S) {
        (self.callback)(ProgressEvent::Message {
            task: self.task,
            message: message.into(),
        });
    }
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_started(&self, _task: u64, _title: &str, _info: &str) {}
    fn on_title(&self, _task: u64, _title: &str) {}
    fn on_message(&self, _task: u64, _message: &str) {}
    fn on_indeterminate(&self, _task: u64, _indeterminate: bool) {}
    fn on_steps(&self, _task: u64, _total: usize) {}
    fn on_step(&self, _task: u64) {}
    fn on_bytes(&self, _task: u64, _downloaded: u64, _total: Option<u64>) {}
    fn on_done(&self, _task: u64) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event: ProgressEvent| match event {
            ProgressEvent::Started { task, title, info } => self.on_started(task, &title, &info),
            ProgressEvent::Title { task, title } => self.on_title(task, &title),
            ProgressEvent::Message { task, message } => self.on_message(task, &message),
            ProgressEvent::Indeterminate { task, indeterminate } => {
                self.on_indeterminate(task, indeterminate)
            }
            ProgressEvent::Steps { task, total } => self.on_steps(task, total),
            ProgressEvent::Step { task } => self.on_step(task),
            ProgressEvent::Bytes {
                task,
                downloaded,
                total,
            } => self.on_bytes(task, downloaded, total),
            ProgressEvent::Done { task } => self.on_done(task),
        })
    }
}

/// Simple console progress reporter
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_started(&self, task: u64, title: &str, info: &str) {
        if self.verbose {
            println!("[{:>3}] {} - {}", task, title, info);
        }
    }

    fn on_title(&self, task: u64, title: &str) {
        println!("[{:>3}] {}", task, title);
    }

    fn on_message(&self, task: u64, message: &str) {
        if self.verbose {
            println!("[{:>3}]   {}", task, message);
        }
    }

    fn on_bytes(&self, task: u64, downloaded: u64, total: Option<u64>) {
        if self.verbose {
            match total {
                Some(total) if total > 0 => {
                    let percent = (downloaded as f64 / total as f64) * 100.0;
                    println!("[{:>3}]   {:.1}% ({}/{} bytes)", task, percent, downloaded, total);
                }
                _ => println!("[{:>3}]   {} bytes", task, downloaded),
            }
        }
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}
