//! Command registry - the dispatch table of one application.

use std::collections::HashMap;
use std::sync::Arc;

use super::Application;

/// A command handler. Runs on its own thread with the owning application.
pub type CommandHandler =
    Arc<dyn Fn(&Arc<Application>, &[String]) -> anyhow::Result<()> + Send + Sync>;

/// A registered command.
#[derive(Clone)]
pub struct AppCommand {
    pub name: String,
    pub description: Option<String>,
    pub handler: CommandHandler,
}

/// Name to handler mapping, filled at application construction.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, AppCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: &str, description: Option<&str>, handler: F) -> &mut Self
    where
        F: Fn(&Arc<Application>, &[String]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.commands.insert(
            name.to_string(),
            AppCommand {
                name: name.to_string(),
                description: description.map(str::to_string),
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Look up a command by name.
    pub fn get(&self, name: &str) -> Option<&AppCommand> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// All registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CommandRegistry::new();
        registry
            .register("ls", Some("List things"), |_, _| Ok(()))
            .register("/", None, |_, _| Ok(()));

        assert!(registry.contains("ls"));
        assert!(registry.contains("/"));
        assert!(!registry.contains("cmd__ls"));
        assert_eq!(registry.get("ls").unwrap().description.as_deref(), Some("List things"));
        assert_eq!(registry.names(), vec!["/", "ls"]);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = CommandRegistry::new();
        registry.register("x", Some("old"), |_, _| Ok(()));
        registry.register("x", Some("new"), |_, _| Ok(()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x").unwrap().description.as_deref(), Some("new"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = CommandRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
    }
}
