//! The shell: running applications, focus, and the command-line language.
//!
//! An input line holds one or more commands separated by `;`. Each command
//! is a head and whitespace-separated arguments. Heads starting with `:` and
//! `echo` are handled here, a head naming an available application opens
//! it, and anything else goes to the focused application.

use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use anyhow::{Context, anyhow};
use fxi_kernel::{AppEnv, Application, KernelError};
use indexmap::IndexMap;
use regex::Regex;

use crate::apps::{AppContext, Catalog, launch};
use crate::keymap::{self, ShellAction};
use crate::lock;
use crate::prompt::LinePrompt;
use crate::settings::ShellSettings;
use crate::terminal::Output;

fn command_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"; ?").expect("valid separator pattern"))
}

/// Argument replaced by the clipboard contents.
const CLIPBOARD_ARG: &str = "!c";

/// Source of `!c` substitutions.
pub trait ClipboardSource: Send + Sync {
    fn text(&self) -> anyhow::Result<String>;
}

/// The system clipboard.
pub struct SystemClipboard;

impl ClipboardSource for SystemClipboard {
    fn text(&self) -> anyhow::Result<String> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| anyhow!("failed to access clipboard: {}", e))?;
        clipboard
            .get_text()
            .map_err(|e| anyhow!("failed to paste: {}", e))
    }
}

/// What handling one input line led to.
#[derive(Debug, Default)]
pub struct LineOutcome {
    pub quit: bool,
    /// Threads started for the line (commands and application opens).
    pub spawned: Vec<JoinHandle<()>>,
}

impl LineOutcome {
    /// Wait for every thread the line started.
    pub fn join(self) -> bool {
        for handle in self.spawned {
            if handle.join().is_err() {
                tracing::warn!("command thread panicked");
            }
        }
        self.quit
    }
}

#[derive(Default)]
struct Running {
    apps: IndexMap<String, Arc<Application>>,
    current: Option<String>,
}

pub struct Shell {
    env: AppEnv,
    settings: ShellSettings,
    catalog: Catalog,
    clipboard: Arc<dyn ClipboardSource>,
    out: Output,
    running: Mutex<Running>,
}

impl Shell {
    pub fn new(
        env: AppEnv,
        settings: ShellSettings,
        catalog: Catalog,
        clipboard: Arc<dyn ClipboardSource>,
        out: Output,
    ) -> Arc<Self> {
        Arc::new(Self {
            env,
            settings,
            catalog,
            clipboard,
            out,
            running: Mutex::new(Running::default()),
        })
    }

    /// Names of the running applications, in opening order.
    pub fn running(&self) -> Vec<String> {
        lock(&self.running).apps.keys().cloned().collect()
    }

    pub fn current_app(&self) -> Option<Arc<Application>> {
        let running = lock(&self.running);
        let name = running.current.as_ref()?;
        running.apps.get(name).cloned()
    }

    /// Open `name`, or focus it when it is already running.
    pub fn open_app(&self, name: &str) -> anyhow::Result<Arc<Application>> {
        if let Some(app) = self.focus(name) {
            return Ok(app);
        }

        let module = self
            .catalog
            .get(name)
            .with_context(|| format!("no application named {}", name))?;
        let ctx = AppContext {
            settings: self.settings.clone(),
            available: self.catalog.names(),
        };
        let app = launch(module.as_ref(), self.env.clone(), &ctx)?;

        let mut running = lock(&self.running);
        if let Some(existing) = running.apps.get(name).cloned() {
            // Opened concurrently by another line; keep the first instance.
            drop(running);
            app.quit();
            return Ok(existing);
        }
        running.apps.insert(name.to_string(), app.clone());
        running.current = Some(name.to_string());
        tracing::info!(app = name, "application opened");
        Ok(app)
    }

    /// Stop `name` and forget it. Focus moves to the last running
    /// application if `name` had it.
    pub fn unload_app(&self, name: &str) -> bool {
        let removed = {
            let mut running = lock(&self.running);
            let removed = running.apps.shift_remove(name);
            if removed.is_some() && running.current.as_deref() == Some(name) {
                running.current = running.apps.keys().last().cloned();
            }
            removed
        };

        match removed {
            Some(app) => {
                app.quit();
                true
            }
            None => false,
        }
    }

    /// Unload and open a fresh instance. The old instance's workers wind
    /// down on their own.
    pub fn reload_app(&self, name: &str) -> anyhow::Result<Arc<Application>> {
        self.unload_app(name);
        self.open_app(name)
    }

    pub fn focus(&self, name: &str) -> Option<Arc<Application>> {
        let mut running = lock(&self.running);
        let app = running.apps.get(name).cloned()?;
        running.current = Some(name.to_string());
        Some(app)
    }

    /// Focus the `index`-th running application.
    pub fn focus_index(&self, index: usize) -> Option<Arc<Application>> {
        let mut running = lock(&self.running);
        let (name, app) = running
            .apps
            .get_index(index)
            .map(|(name, app)| (name.clone(), app.clone()))?;
        running.current = Some(name);
        Some(app)
    }

    /// Quit every running application.
    pub fn stop_apps(&self) {
        let apps: Vec<_> = {
            let mut running = lock(&self.running);
            running.current = None;
            running.apps.drain(..).map(|(_, app)| app).collect()
        };
        for app in apps {
            app.quit();
        }
    }

    /// Apply a key binding. Returns true when the shell should exit.
    pub fn apply_key(&self, action: ShellAction) -> bool {
        match action {
            ShellAction::ClearInput => {
                tracing::trace!("input cleared");
            }
            ShellAction::Quit => return true,
            ShellAction::Refresh => {
                if let Some(app) = self.current_app() {
                    app.refresh();
                }
            }
            ShellAction::CloseMonitor => {
                if let Some(app) = self.current_app() {
                    app.close_monitor();
                }
            }
            ShellAction::Focus(index) => {
                if self.focus_index(index).is_none() {
                    tracing::debug!(index, "no application at that position");
                }
            }
            ShellAction::PreviousSlide | ShellAction::NextSlide => {
                let Some(show) = self.current_app().and_then(|app| app.slideshow()) else {
                    tracing::trace!("no slide show to navigate");
                    return false;
                };
                if action == ShellAction::NextSlide {
                    show.next();
                } else {
                    show.previous();
                }
            }
        }
        false
    }

    /// Route one submitted input line. Returns true when the shell should exit.
    ///
    /// Key bindings win over a pending question, so `^d` still quits while
    /// an application waits for an answer.
    pub fn submit(self: &Arc<Self>, prompt: &LinePrompt, line: &str) -> bool {
        if let Some(action) = keymap::parse(line) {
            return self.apply_key(action);
        }
        if prompt.answer(line) {
            return false;
        }
        self.handle_line(line).quit
    }

    /// Run every command on an input line.
    ///
    /// Commands after `:q` are not run.
    pub fn handle_line(self: &Arc<Self>, line: &str) -> LineOutcome {
        let mut outcome = LineOutcome::default();
        for command in command_separator().split(line) {
            let mut words = command.split_whitespace().map(str::to_string);
            let Some(head) = words.next() else {
                continue;
            };
            let args = match self.substitute_clipboard(words.collect()) {
                Ok(args) => args,
                Err(e) => {
                    tracing::warn!(command = %head, error = %e, "clipboard unavailable, command skipped");
                    continue;
                }
            };

            if self.run_command(&head, args, &mut outcome) {
                outcome.quit = true;
                break;
            }
        }
        outcome
    }

    fn substitute_clipboard(&self, args: Vec<String>) -> anyhow::Result<Vec<String>> {
        if !args.iter().any(|arg| arg == CLIPBOARD_ARG) {
            return Ok(args);
        }
        let text = self.clipboard.text()?;
        Ok(args
            .into_iter()
            .map(|arg| if arg == CLIPBOARD_ARG { text.clone() } else { arg })
            .collect())
    }

    /// Returns true for `:q`.
    fn run_command(
        self: &Arc<Self>,
        head: &str,
        args: Vec<String>,
        outcome: &mut LineOutcome,
    ) -> bool {
        tracing::debug!(command = head, ?args, "shell command");
        match head {
            ":q" => return true,
            ":r" => {
                if let Some(name) = self.target(&args) {
                    self.spawn_open(name, true, outcome);
                }
            }
            ":c" => {
                if let Some(name) = self.target(&args) {
                    if !self.unload_app(&name) {
                        tracing::warn!(app = %name, "application is not running");
                    }
                }
            }
            "echo" => self.out.line(&args.join(" ")),
            name if self.catalog.contains(name) => {
                self.spawn_open(name.to_string(), false, outcome);
            }
            _ => self.forward(head, args, outcome),
        }
        false
    }

    /// The application named in `args`, defaulting to the focused one.
    fn target(&self, args: &[String]) -> Option<String> {
        let target = args
            .first()
            .cloned()
            .or_else(|| lock(&self.running).current.clone());
        if target.is_none() {
            tracing::warn!("no application to act on");
        }
        target
    }

    /// Open (or reload) an application on its own thread.
    fn spawn_open(self: &Arc<Self>, name: String, reload: bool, outcome: &mut LineOutcome) {
        let shell = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("open-{}", name))
            .spawn(move || {
                let result = if reload {
                    shell.reload_app(&name)
                } else {
                    shell.open_app(&name)
                };
                if let Err(e) = result {
                    tracing::warn!(app = %name, error = %format!("{:#}", e), "failed to open application");
                }
            });
        match spawned {
            Ok(handle) => outcome.spawned.push(handle),
            Err(e) => tracing::error!(error = %e, "failed to spawn thread"),
        }
    }

    fn forward(&self, head: &str, args: Vec<String>, outcome: &mut LineOutcome) {
        let Some(app) = self.current_app() else {
            tracing::warn!(command = head, "no application is focused");
            return;
        };
        match app.handle_command(head, args) {
            Ok(handle) => outcome.spawned.push(handle),
            Err(KernelError::UnknownCommand(name)) => {
                tracing::warn!(app = %app.title(), command = %name, "unknown command");
            }
            Err(e) => tracing::warn!(app = %app.title(), error = %e, "command not dispatched"),
        }
    }
}
