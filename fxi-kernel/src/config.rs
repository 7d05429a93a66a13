//! SQLite-backed per-application configuration.
//!
//! Values are looked up by `(app, key)`. Missing values can be asked for
//! interactively; answers stay unsaved until the application decides they
//! are good (e.g. after a login succeeded) and calls `persist_unsaved`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{KernelError, lock};

/// Blocking question/answer round-trip with the user.
pub trait Prompt: Send + Sync {
    /// Ask `question`; `None` means the user gave no answer.
    fn ask(&self, question: &str, hidden: bool) -> Option<String>;
}

/// A prompt that never answers. Used when no interactive input exists.
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn ask(&self, question: &str, _hidden: bool) -> Option<String> {
        tracing::debug!(question, "no prompt available");
        None
    }
}

/// The key-value store shared by all applications.
pub struct ConfigStore {
    conn: Mutex<Connection>,
}

impl ConfigStore {
    /// Open or create the store at the default location
    /// (`<config dir>/fxi/config.db`).
    pub fn open_default() -> Result<Self> {
        let path = default_db_path()?;
        Self::open(&path)
    }

    /// Open or create the store at a specific path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config (
                app TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (app, key)
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, app: &str, key: &str) -> Result<Option<String>, KernelError> {
        let conn = lock(&self.conn);
        let value = conn
            .query_row(
                "SELECT value FROM config WHERE app = ?1 AND key = ?2",
                params![app, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, app: &str, key: &str, value: &str) -> Result<(), KernelError> {
        let conn = lock(&self.conn);
        conn.execute(
            r#"INSERT INTO config (app, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(app, key) DO UPDATE SET value = excluded.value,
                                                   updated_at = excluded.updated_at"#,
            params![app, key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn remove(&self, app: &str, key: &str) -> Result<bool, KernelError> {
        let conn = lock(&self.conn);
        let n = conn.execute(
            "DELETE FROM config WHERE app = ?1 AND key = ?2",
            params![app, key],
        )?;
        Ok(n > 0)
    }

    /// Keys stored for `app`, sorted.
    pub fn keys(&self, app: &str) -> Result<Vec<String>, KernelError> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare("SELECT key FROM config WHERE app = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![app], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

fn default_db_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("fxi").join("config.db"))
}

/// One application's view of the store, plus its unsaved answers.
pub struct AppConfig {
    app: String,
    store: Arc<ConfigStore>,
    prompt: Arc<dyn Prompt>,
    unsaved: Mutex<BTreeMap<String, String>>,
}

impl AppConfig {
    pub fn new(app: impl Into<String>, store: Arc<ConfigStore>, prompt: Arc<dyn Prompt>) -> Self {
        Self {
            app: app.into(),
            store,
            prompt,
            unsaved: Mutex::new(BTreeMap::new()),
        }
    }

    /// Stored value, falling back to an unsaved answer.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.store.get(&self.app, key) {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => tracing::warn!(app = %self.app, key, error = %e, "config read failed"),
        }
        lock(&self.unsaved).get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), KernelError> {
        self.store.set(&self.app, key, value)
    }

    /// Return the value for `key`, asking the user when it is missing.
    ///
    /// An empty answer falls back to `default`. Answers are kept unsaved.
    pub fn get_or_ask(
        &self,
        key: &str,
        label: Option<&str>,
        hidden: bool,
        default: Option<&str>,
    ) -> Option<String> {
        if let Some(value) = self.get(key) {
            return Some(value);
        }

        let label = label.unwrap_or(key);
        let question = match default {
            Some(default) => format!("{} [{}]", label, default),
            None => label.to_string(),
        };

        let answer = self
            .prompt
            .ask(&question, hidden)
            .filter(|answer| !answer.is_empty())
            .or_else(|| default.map(str::to_string))?;

        lock(&self.unsaved).insert(key.to_string(), answer.clone());
        Some(answer)
    }

    /// Like `get_or_ask`, but a missing answer is an error.
    pub fn require(&self, key: &str, label: Option<&str>, hidden: bool) -> Result<String, KernelError> {
        self.get_or_ask(key, label, hidden, None)
            .ok_or_else(|| KernelError::NoAnswer(key.to_string()))
    }

    /// Write all unsaved answers to the store. Returns how many were written.
    pub fn persist_unsaved(&self) -> Result<usize, KernelError> {
        let pending = std::mem::take(&mut *lock(&self.unsaved));
        let mut written = 0;
        let mut failed = BTreeMap::new();
        let mut first_error = None;

        for (key, value) in pending {
            match self.store.set(&self.app, &key, &value) {
                Ok(()) => written += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                    failed.insert(key, value);
                }
            }
        }

        if let Some(e) = first_error {
            lock(&self.unsaved).extend(failed);
            return Err(e);
        }
        Ok(written)
    }

    /// Keys answered but not yet persisted.
    pub fn unsaved_keys(&self) -> Vec<String> {
        lock(&self.unsaved).keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedPrompt {
        answers: Mutex<Vec<String>>,
        asked: Mutex<Vec<(String, bool)>>,
    }

    impl ScriptedPrompt {
        fn new(answers: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
                asked: Mutex::new(Vec::new()),
            })
        }
    }

    impl Prompt for ScriptedPrompt {
        fn ask(&self, question: &str, hidden: bool) -> Option<String> {
            lock(&self.asked).push((question.to_string(), hidden));
            lock(&self.answers).pop()
        }
    }

    fn config(prompt: Arc<dyn Prompt>) -> AppConfig {
        let store = Arc::new(ConfigStore::open_in_memory().unwrap());
        AppConfig::new("mail", store, prompt)
    }

    #[test]
    fn test_store_set_get_overwrite() {
        let store = ConfigStore::open_in_memory().unwrap();
        assert_eq!(store.get("a", "k").unwrap(), None);
        store.set("a", "k", "v1").unwrap();
        store.set("a", "k", "v2").unwrap();
        assert_eq!(store.get("a", "k").unwrap(), Some("v2".to_string()));
        assert_eq!(store.get("b", "k").unwrap(), None);
    }

    #[test]
    fn test_store_keys_and_remove() {
        let store = ConfigStore::open_in_memory().unwrap();
        store.set("a", "zeta", "1").unwrap();
        store.set("a", "alpha", "2").unwrap();
        assert_eq!(store.keys("a").unwrap(), vec!["alpha", "zeta"]);
        assert!(store.remove("a", "zeta").unwrap());
        assert!(!store.remove("a", "zeta").unwrap());
    }

    #[test]
    fn test_get_or_ask_uses_stored_value_without_asking() {
        let prompt = ScriptedPrompt::new(&["ignored"]);
        let cfg = config(prompt.clone());
        cfg.set("user", "alice").unwrap();
        assert_eq!(cfg.get_or_ask("user", None, false, None), Some("alice".into()));
        assert!(lock(&prompt.asked).is_empty());
    }

    #[test]
    fn test_get_or_ask_labels_default_and_falls_back() {
        let prompt = ScriptedPrompt::new(&[""]);
        let cfg = config(prompt.clone());
        let value = cfg.get_or_ask("host", Some("IMAP host"), false, Some("imap.example.com"));
        assert_eq!(value, Some("imap.example.com".into()));
        assert_eq!(
            lock(&prompt.asked).as_slice(),
            &[("IMAP host [imap.example.com]".to_string(), false)]
        );
    }

    #[test]
    fn test_answers_stay_unsaved_until_persisted() {
        let prompt = ScriptedPrompt::new(&["s3cret"]);
        let cfg = config(prompt.clone());
        assert_eq!(cfg.get_or_ask("password", None, true, None), Some("s3cret".into()));
        assert_eq!(cfg.unsaved_keys(), vec!["password"]);
        assert_eq!(cfg.store.get("mail", "password").unwrap(), None);

        // Asked once only; the unsaved answer is reused.
        assert_eq!(cfg.get("password"), Some("s3cret".into()));
        assert_eq!(lock(&prompt.asked).len(), 1);

        assert_eq!(cfg.persist_unsaved().unwrap(), 1);
        assert!(cfg.unsaved_keys().is_empty());
        assert_eq!(cfg.store.get("mail", "password").unwrap(), Some("s3cret".into()));
    }

    #[test]
    fn test_require_without_answer_errors() {
        let cfg = config(Arc::new(NoPrompt));
        let err = cfg.require("token", None, true).unwrap_err();
        assert!(matches!(err, KernelError::NoAnswer(k) if k == "token"));
    }

    #[test]
    fn test_store_on_disk_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.db");
        {
            let store = ConfigStore::open(&path).unwrap();
            store.set("reader", "page_size", "100").unwrap();
        }
        let store = ConfigStore::open(&path).unwrap();
        assert_eq!(store.get("reader", "page_size").unwrap(), Some("100".into()));
    }
}
