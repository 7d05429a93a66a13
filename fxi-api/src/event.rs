//! Events published by applications to the host (status line, lifecycle).

use serde::{Deserialize, Serialize};

/// Unique identifier for an opened monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorId(pub u64);

/// Events emitted by running applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellEvent {
    /// Transient status line message. `None` resets the status line.
    Status {
        app: String,
        message: Option<String>,
    },

    /// An application finished construction and is ready for commands.
    AppOpened { app: String },

    /// An application was unloaded. Its workers drain out on their next poll.
    AppClosed { app: String },

    /// A monitor became the current view of an application.
    MonitorOpened {
        app: String,
        monitor_id: MonitorId,
        title: Option<String>,
    },

    /// A monitor was closed; further writes to it are discarded.
    MonitorClosed { app: String, monitor_id: MonitorId },

    /// A background task failed or panicked and was dropped.
    TaskFailed {
        app: String,
        task: String,
        error: String,
    },

    /// A command handler returned an error or panicked.
    CommandFailed {
        app: String,
        command: String,
        error: String,
    },
}

impl ShellEvent {
    /// Name of the application the event originated from.
    pub fn app(&self) -> &str {
        match self {
            ShellEvent::Status { app, .. }
            | ShellEvent::AppOpened { app }
            | ShellEvent::AppClosed { app }
            | ShellEvent::MonitorOpened { app, .. }
            | ShellEvent::MonitorClosed { app, .. }
            | ShellEvent::TaskFailed { app, .. }
            | ShellEvent::CommandFailed { app, .. } => app,
        }
    }
}
