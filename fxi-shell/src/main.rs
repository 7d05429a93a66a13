//! fxi - a shell hosting small applications that write into monitors.
//!
//! Main entry point for the line-oriented terminal front end.

mod apps;
mod keymap;
mod prompt;
mod settings;
mod shell;
mod terminal;

use std::io::BufRead;
use std::sync::Arc;

use fxi_kernel::{AppEnv, ConfigStore, HttpFetcher};
use tracing_subscriber::EnvFilter;

use crate::apps::Catalog;
use crate::prompt::LinePrompt;
use crate::settings::ShellSettings;
use crate::shell::{Shell, SystemClipboard};
use crate::terminal::{Output, TerminalSurface};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with rendered output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting fxi shell");

    let settings = ShellSettings::load();
    let out = Output::stdout();
    let prompt = Arc::new(LinePrompt::new(out.clone()));

    let store = match ConfigStore::open_default() {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "config store unavailable, using in-memory store");
            ConfigStore::open_in_memory()?
        }
    };

    let (events, status_rx) = fxi_kernel::event_channel();
    let env = AppEnv {
        surface: Arc::new(TerminalSurface::new(out.clone())),
        fetcher: Arc::new(HttpFetcher::new()?),
        prompt: prompt.clone(),
        store: Arc::new(store),
        events,
        pool: settings.pool,
    };
    terminal::spawn_status_printer(status_rx, out.clone())?;

    let shell = Shell::new(
        env,
        settings.clone(),
        Catalog::bundled(),
        Arc::new(SystemClipboard),
        out,
    );
    for name in &settings.startup_apps {
        if let Err(e) = shell.open_app(name) {
            tracing::warn!(app = %name, error = %format!("{:#}", e), "startup application failed");
        }
    }

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if shell.submit(&prompt, &line) {
            break;
        }
    }

    prompt.cancel();
    shell.stop_apps();
    tracing::info!("fxi shell exiting");
    Ok(())
}
