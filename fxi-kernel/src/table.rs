//! Main-list tables: rows of records with a transient status marker.
//!
//! Each row is rendered into a slot of the table's view so it can be
//! re-rendered in place (marker changes, refreshes) without moving.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fxi_api::{ElementId, HeadingLevel, Record, Renderer, SlotContent};

use crate::lock;

/// Marker shown while an entry is being reloaded.
pub const LOADING_MARK: &str = "*";

/// One row of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    index: usize,
    data: Record,
    marker: String,
}

impl Entry {
    fn new(index: usize, data: Record) -> Self {
        Self {
            index,
            data,
            marker: index.to_string(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Text of one rendered row: marker, then each cell's fields joined.
    fn row_text(&self, cells: &[Vec<String>]) -> String {
        let columns: Vec<String> = cells
            .iter()
            .map(|cell| {
                cell.iter()
                    .map(|key| self.data.get(key).map(|v| v.to_string()).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        format!("{:>4}  {}", self.marker, columns.join(" | "))
    }

    fn element(&self) -> ElementId {
        // Element 0 is the header row.
        ElementId(self.index as u64 + 1)
    }
}

type EntryFn = Arc<dyn Fn(&Entry) -> anyhow::Result<()> + Send + Sync>;

/// A named action that operates on one entry.
#[derive(Clone)]
pub struct EntryCommand {
    pub name: String,
    pub description: Option<String>,
    function: EntryFn,
}

struct TableState {
    renderer: Box<dyn Renderer>,
    cells: Vec<Vec<String>>,
    headers: Vec<String>,
    entries: Vec<Entry>,
    rendered: bool,
}

impl TableState {
    fn draw(&mut self, index: usize) {
        let entry = &self.entries[index];
        let text = entry.row_text(&self.cells);
        self.renderer
            .fill_slot(entry.element(), &SlotContent::Text(text));
    }
}

struct TableShared {
    alive: AtomicBool,
    state: Mutex<TableState>,
    commands: Mutex<HashMap<String, EntryCommand>>,
}

/// A table of entries owned by an application.
#[derive(Clone)]
pub struct Table {
    shared: Arc<TableShared>,
}

impl Table {
    /// `cells` lists, per column, the record fields shown in that column.
    pub fn new(renderer: Box<dyn Renderer>, cells: Vec<Vec<String>>, headers: Vec<String>) -> Self {
        let state = TableState {
            renderer,
            cells,
            headers,
            entries: Vec::new(),
            rendered: false,
        };
        Self {
            shared: Arc::new(TableShared {
                alive: AtomicBool::new(true),
                state: Mutex::new(state),
                commands: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    fn with_live_state<R>(&self, f: impl FnOnce(&mut TableState) -> R) -> Option<R> {
        if !self.is_alive() {
            return None;
        }
        let mut state = lock(&self.shared.state);
        if !self.is_alive() {
            return None;
        }
        Some(f(&mut state))
    }

    /// Render the header row and one row per record, replacing any
    /// previous rows.
    pub fn render(&self, rows: impl IntoIterator<Item = Record>) {
        let rows: Vec<Record> = rows.into_iter().collect();
        self.with_live_state(|state| {
            if state.rendered {
                state.renderer.clear();
            }
            let header = std::iter::once("#".to_string())
                .chain(state.headers.iter().cloned())
                .collect::<Vec<_>>()
                .join(" | ");
            state
                .renderer
                .append_heading(ElementId(0), HeadingLevel::H3, &header);

            state.entries = rows
                .into_iter()
                .enumerate()
                .map(|(index, data)| Entry::new(index, data))
                .collect();
            for index in 0..state.entries.len() {
                let id = state.entries[index].element();
                state.renderer.append_slot(id);
                state.draw(index);
            }
            state.rendered = true;
        });
    }

    /// Set an entry's marker. `"loading"` is shown as `*`.
    pub fn mark(&self, index: usize, mark: &str) -> bool {
        let mark = if mark == "loading" { LOADING_MARK } else { mark };
        self.with_live_state(|state| {
            let Some(entry) = state.entries.get_mut(index) else {
                return false;
            };
            entry.marker = mark.to_string();
            state.draw(index);
            true
        })
        .unwrap_or(false)
    }

    /// Replace an entry's data (if given) and re-render it with its index
    /// as marker.
    pub fn update(&self, index: usize, data: Option<Record>) -> bool {
        self.with_live_state(|state| {
            let Some(entry) = state.entries.get_mut(index) else {
                return false;
            };
            if let Some(data) = data {
                entry.data = data;
            }
            entry.marker = entry.index.to_string();
            state.draw(index);
            true
        })
        .unwrap_or(false)
    }

    /// Mark every entry as loading, then re-render each one.
    pub fn refresh(&self) {
        let count = self.len();
        for index in 0..count {
            self.mark(index, "loading");
        }
        for index in 0..count {
            self.update(index, None);
        }
    }

    /// Drop every row. The table can be rendered again.
    pub fn clear(&self) {
        self.with_live_state(|state| {
            state.entries.clear();
            state.renderer.clear();
            state.rendered = false;
        });
    }

    /// Destroy the table's view; every later call is a no-op.
    pub fn destroy(&self) {
        let mut state = lock(&self.shared.state);
        if !self.shared.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        state.entries.clear();
        state.renderer.destroy();
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry(&self, index: usize) -> Option<Entry> {
        lock(&self.shared.state).entries.get(index).cloned()
    }

    pub fn entries(&self) -> Vec<Entry> {
        lock(&self.shared.state).entries.clone()
    }

    pub fn add_entry_command<F>(&self, name: &str, description: Option<&str>, function: F)
    where
        F: Fn(&Entry) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        lock(&self.shared.commands).insert(
            name.to_string(),
            EntryCommand {
                name: name.to_string(),
                description: description.map(str::to_string),
                function: Arc::new(function),
            },
        );
    }

    pub fn entry_commands(&self) -> Vec<EntryCommand> {
        let mut commands: Vec<_> = lock(&self.shared.commands).values().cloned().collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }

    /// Run the entry command `name` against entry `index`.
    pub fn run_entry_command(&self, name: &str, index: usize) -> anyhow::Result<()> {
        let command = lock(&self.shared.commands)
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown entry command: {}", name))?;
        let entry = self
            .entry(index)
            .ok_or_else(|| anyhow::anyhow!("no entry {}", index))?;
        (command.function)(&entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySurface, RenderOp};
    use fxi_api::{Surface, Value};

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn table() -> (Table, MemorySurface) {
        let surface = MemorySurface::new();
        let t = Table::new(
            surface.open_view("t"),
            vec![
                vec!["phrase".into()],
                vec!["count".into(), "rand".into()],
                vec!["word".into()],
            ],
            vec!["Phrase".into(), "".into(), "Word".into()],
        );
        (t, surface)
    }

    fn last_fill(ops: &[RenderOp], id: ElementId) -> Option<String> {
        ops.iter().rev().find_map(|op| match op {
            RenderOp::Fill(i, SlotContent::Text(t)) if *i == id => Some(t.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_render_rows_with_cell_groups() {
        let (t, surface) = table();
        t.render(vec![record(&[
            ("phrase", "hello there".into()),
            ("count", Value::Int(2)),
            ("rand", Value::Int(42)),
            ("word", "x".into()),
        ])]);

        let ops = surface.ops(0);
        assert_eq!(
            ops[0],
            RenderOp::Heading(ElementId(0), HeadingLevel::H3, "# | Phrase |  | Word".into())
        );
        assert_eq!(
            last_fill(&ops, ElementId(1)).unwrap(),
            "   0  hello there | 2 42 | x"
        );
    }

    #[test]
    fn test_mark_loading_then_refresh_restores_index() {
        let (t, surface) = table();
        t.render(vec![record(&[("word", "a".into())]), record(&[("word", "b".into())])]);

        assert!(t.mark(1, "loading"));
        assert_eq!(t.entry(1).unwrap().marker(), "*");

        t.refresh();
        assert_eq!(t.entry(1).unwrap().marker(), "1");
        assert!(last_fill(&surface.ops(0), ElementId(2)).unwrap().starts_with("   1"));
    }

    #[test]
    fn test_update_replaces_data() {
        let (t, _) = table();
        t.render(vec![record(&[("word", "old".into())])]);
        assert!(t.update(0, Some(record(&[("word", "new".into())]))));
        assert_eq!(t.entry(0).unwrap().data()["word"], Value::from("new"));
        assert!(!t.update(7, None));
    }

    #[test]
    fn test_destroyed_table_ignores_marks() {
        let (t, surface) = table();
        t.render(vec![record(&[("word", "a".into())])]);
        t.destroy();
        let before = surface.ops(0).len();
        assert!(!t.mark(0, "loading"));
        t.render(vec![record(&[("word", "b".into())])]);
        t.destroy();
        assert_eq!(surface.ops(0).len(), before);
        assert!(t.is_empty());
    }

    #[test]
    fn test_clear_allows_rerender() {
        let (t, _) = table();
        t.render(vec![record(&[("word", "a".into())])]);
        t.clear();
        assert!(t.is_empty());
        t.render(vec![record(&[("word", "b".into())]), record(&[("word", "c".into())])]);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_entry_commands() {
        let (t, _) = table();
        t.render(vec![record(&[("word", "a".into())])]);
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        t.add_entry_command("open", Some("Open entry"), move |entry| {
            *lock(&sink) = Some(entry.index());
            Ok(())
        });

        t.run_entry_command("open", 0).unwrap();
        assert_eq!(*lock(&seen), Some(0));
        assert!(t.run_entry_command("open", 3).is_err());
        assert!(t.run_entry_command("nope", 0).is_err());
        assert_eq!(t.entry_commands()[0].description.as_deref(), Some("Open entry"));
    }
}
