//! Applications - one hosted feature module with its own current monitor,
//! task queue and command table.
//!
//! Every command runs on a freshly spawned thread. Work a handler wants to
//! defer (downloads, refreshes) goes to the application's task queue.

mod registry;

pub use registry::{AppCommand, CommandHandler, CommandRegistry};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use fxi_api::{ElementId, HeadingLevel, Renderer, ShellEvent, Surface};

use crate::config::{AppConfig, ConfigStore, Prompt};
use crate::fetch::Fetcher;
use crate::monitor::Monitor;
use crate::slideshow::{Slide, SlideShow};
use crate::table::Table;
use crate::tasks::{PoolConfig, Task, TaskQueue, run_guarded};
use crate::{EventSender, KernelError, lock};

/// Host collaborators handed to every application.
#[derive(Clone)]
pub struct AppEnv {
    pub surface: Arc<dyn Surface>,
    pub fetcher: Arc<dyn Fetcher>,
    pub prompt: Arc<dyn Prompt>,
    pub store: Arc<ConfigStore>,
    pub events: EventSender,
    pub pool: PoolConfig,
}

/// A running application.
pub struct Application {
    title: String,
    alive: Arc<AtomicBool>,
    env: AppEnv,
    tab: Mutex<Box<dyn Renderer>>,
    tab_elements: AtomicU64,
    current_monitor: Mutex<Option<Monitor>>,
    slideshow: Mutex<Option<SlideShow>>,
    tasks: TaskQueue,
    commands: CommandRegistry,
    config: AppConfig,
    main_list: Mutex<Option<Table>>,
}

impl Application {
    /// Create an application and its (still empty) worker pool.
    pub fn new(title: impl Into<String>, env: AppEnv, commands: CommandRegistry) -> Arc<Self> {
        let title = title.into();
        let alive = Arc::new(AtomicBool::new(true));
        let tasks = TaskQueue::new(title.clone(), alive.clone(), env.pool, env.events.clone());
        let config = AppConfig::new(title.clone(), env.store.clone(), env.prompt.clone());
        let tab = env.surface.open_view(&title);

        let app = Arc::new(Self {
            title,
            alive,
            env,
            tab: Mutex::new(tab),
            tab_elements: AtomicU64::new(0),
            current_monitor: Mutex::new(None),
            slideshow: Mutex::new(None),
            tasks,
            commands,
            config,
            main_list: Mutex::new(None),
        });

        tracing::debug!(app = %app.title, commands = app.commands.len(), "application created");
        app.emit(ShellEvent::AppOpened {
            app: app.title.clone(),
        });
        app
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn env(&self) -> &AppEnv {
        &self.env
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Top-level heading on the application's tab (outside any monitor).
    pub fn heading(&self, text: &str) {
        if !self.is_alive() {
            return;
        }
        let id = ElementId(self.tab_elements.fetch_add(1, Ordering::Relaxed));
        lock(&self.tab).append_heading(id, HeadingLevel::H1, text);
    }

    /// Close the current monitor (if any) and make a new one current.
    ///
    /// Opening on a dead application hands back an already closed monitor.
    pub fn open_monitor(&self, title: Option<&str>) -> Monitor {
        let mut current = lock(&self.current_monitor);
        if let Some(previous) = current.take() {
            previous.close();
        }

        let monitor = Monitor::new(
            &self.title,
            self.env.surface.open_view(&self.title),
            self.env.fetcher.clone(),
            self.env.events.clone(),
        );

        if !self.is_alive() {
            monitor.close();
            return monitor;
        }

        if let Some(title) = title {
            monitor.h1(title);
        }
        *current = Some(monitor.clone());
        drop(current);

        self.emit(ShellEvent::MonitorOpened {
            app: self.title.clone(),
            monitor_id: monitor.id(),
            title: title.map(str::to_string),
        });
        monitor
    }

    pub fn current_monitor(&self) -> Option<Monitor> {
        lock(&self.current_monitor).clone()
    }

    /// Replace the current monitor with a slide show over `slides`.
    ///
    /// A slide show opened earlier is closed first.
    pub fn open_slideshow(self: &Arc<Self>, slides: Vec<Slide>) -> SlideShow {
        let mut current = lock(&self.slideshow);
        if let Some(previous) = current.take() {
            previous.close();
        }
        let show = SlideShow::new(self, self.open_monitor(None), slides);
        if show.is_alive() {
            *current = Some(show.clone());
        }
        show
    }

    /// The slide show on screen, if it is still open.
    pub fn slideshow(&self) -> Option<SlideShow> {
        lock(&self.slideshow)
            .as_ref()
            .filter(|show| show.is_alive())
            .cloned()
    }

    /// Close the current monitor without opening another one.
    pub fn close_monitor(&self) {
        if let Some(monitor) = lock(&self.current_monitor).take() {
            monitor.close();
        }
    }

    /// Queue background work on this application's pool.
    pub fn enqueue<F>(&self, label: impl Into<String>, job: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.tasks.enqueue(Task::new(label, job));
    }

    /// Run `f` on a new, unpooled thread.
    pub fn new_thread<F>(&self, name: &str, f: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name(format!("{}-{}", self.title, name))
            .spawn(f)
    }

    /// Dispatch a command to its handler on a new thread.
    ///
    /// Handler errors and panics are logged and published; they never reach
    /// the caller or any other thread.
    pub fn handle_command(
        self: &Arc<Self>,
        name: &str,
        args: Vec<String>,
    ) -> Result<JoinHandle<()>, KernelError> {
        if !self.is_alive() {
            return Err(KernelError::NotRunning(self.title.clone()));
        }
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| KernelError::UnknownCommand(name.to_string()))?;

        let handler = command.handler.clone();
        let command_name = command.name.clone();
        let app = Arc::clone(self);

        let handle = self.new_thread(&format!("cmd-{}", name), move || {
            tracing::debug!(app = %app.title, command = %command_name, ?args, "running command");
            if let Err(err) = run_guarded(|| handler(&app, &args)) {
                tracing::warn!(
                    app = %app.title,
                    command = %command_name,
                    kind = err.kind(),
                    error = %err,
                    "command failed"
                );
                app.emit(ShellEvent::CommandFailed {
                    app: app.title.clone(),
                    command: command_name,
                    error: err.to_string(),
                });
            }
        })?;
        Ok(handle)
    }

    /// Split `line` on whitespace and dispatch it. Blank lines do nothing.
    pub fn handle_command_line(
        self: &Arc<Self>,
        line: &str,
    ) -> Result<Option<JoinHandle<()>>, KernelError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args = words.map(str::to_string).collect();
        self.handle_command(name, args).map(Some)
    }

    /// Publish a status line message; `None` resets it.
    pub fn info(&self, message: Option<&str>) {
        self.emit(ShellEvent::Status {
            app: self.title.clone(),
            message: message.map(str::to_string),
        });
    }

    /// Create the application's main list in its own view.
    pub fn create_table(&self, cells: Vec<Vec<String>>, headers: Vec<String>) -> Table {
        let table = Table::new(self.env.surface.open_view(&self.title), cells, headers);
        if let Some(previous) = lock(&self.main_list).replace(table.clone()) {
            previous.destroy();
        }
        table
    }

    pub fn main_list(&self) -> Option<Table> {
        lock(&self.main_list).clone()
    }

    /// Refresh the main list, if there is one.
    pub fn refresh(&self) {
        if let Some(table) = self.main_list() {
            table.refresh();
        }
    }

    /// Shut the application down. Workers stop after their current task,
    /// queued tasks are dropped unrun and every view is destroyed. Idempotent.
    pub fn quit(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        // Queued closures commonly hold an `Arc` of this application.
        self.tasks.discard_pending();
        if let Some(show) = lock(&self.slideshow).take() {
            show.close();
        }
        self.close_monitor();
        if let Some(table) = lock(&self.main_list).take() {
            table.destroy();
        }
        lock(&self.tab).destroy();

        let unsaved = self.config.unsaved_keys();
        if !unsaved.is_empty() {
            tracing::debug!(app = %self.title, ?unsaved, "discarding unsaved config");
        }

        tracing::info!(app = %self.title, "application closed");
        self.emit(ShellEvent::AppClosed {
            app: self.title.clone(),
        });
    }

    fn emit(&self, event: ShellEvent) {
        let _ = self.env.events.send(event);
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        // Workers hold only the flag, not the application; stop them too.
        self.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) mod test_env {
    use super::*;
    use crate::config::NoPrompt;
    use crate::fetch::test_fetchers::StaticFetcher;
    use crate::memory::MemorySurface;
    use crate::tasks::fast_config;
    use fxi_api::ShellEvent;
    use tokio::sync::broadcast;

    pub fn env() -> (AppEnv, MemorySurface, broadcast::Receiver<ShellEvent>) {
        let surface = MemorySurface::new();
        let (events, rx) = crate::event_channel();
        let env = AppEnv {
            surface: Arc::new(surface.clone()),
            fetcher: Arc::new(StaticFetcher::default()),
            prompt: Arc::new(NoPrompt),
            store: Arc::new(ConfigStore::open_in_memory().unwrap()),
            events,
            pool: fast_config(2),
        };
        (env, surface, rx)
    }
}
