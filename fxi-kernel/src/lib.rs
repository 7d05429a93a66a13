//! FXI Kernel - background execution and output coordination.
//!
//! This crate contains:
//! - The per-application task queue and its bounded worker pool
//! - Monitors, slots and frames (closeable, ordered output views)
//! - Slide shows shown in place of a monitor
//! - Applications and their command dispatch tables
//! - Table/entry main lists
//! - Persistent per-application configuration
//! - The blocking fetch boundary used for images and documents

pub mod app;
pub mod config;
pub mod fetch;
pub mod memory;
pub mod monitor;
pub mod slideshow;
pub mod table;
pub mod tasks;

mod error;

pub use app::{AppCommand, AppEnv, Application, CommandHandler, CommandRegistry};
pub use config::{AppConfig, ConfigStore, NoPrompt, Prompt};
pub use error::{FetchError, KernelError, TaskError};
pub use fetch::{Fetcher, HttpFetcher};
pub use memory::{MemorySurface, RenderOp};
pub use monitor::{Frame, Monitor, Slot};
pub use slideshow::{Slide, SlideShow};
pub use table::{Entry, Table};
pub use tasks::{PoolConfig, Task, TaskQueue, TaskStats};

use fxi_api::ShellEvent;
use tokio::sync::broadcast;

/// Sender half of the event bus shared by every application.
pub type EventSender = broadcast::Sender<ShellEvent>;

/// Create the event bus. The receiver is handed to the host.
pub fn event_channel() -> (EventSender, broadcast::Receiver<ShellEvent>) {
    broadcast::channel(1024)
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
