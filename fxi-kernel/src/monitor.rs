//! Monitors - closeable, ordered output views written from many threads.
//!
//! A monitor is either open or closed, and closing is terminal. Every write
//! checks liveness under the view lock, and `close` flips the flag under that
//! same lock. Once `close` has returned, no write can land, including writes
//! whose fetch was already in flight when the monitor closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use fxi_api::{
    ElementId, HeadingLevel, ImageData, Line, MonitorId, Renderer, ShellEvent, SlotContent,
    indent_text,
};

use crate::fetch::{self, Fetcher};
use crate::{EventSender, lock};

static NEXT_MONITOR_ID: AtomicU64 = AtomicU64::new(1);

struct MonitorState {
    renderer: Box<dyn Renderer>,
    lines: Vec<Line>,
    /// Renderers of the frames in `lines`, keyed by frame id.
    frames: HashMap<ElementId, Box<dyn Renderer>>,
    /// Shared by nested frame content, so ids are unique across the view.
    next_element: u64,
}

impl MonitorState {
    fn allocate(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        id
    }
}

struct MonitorShared {
    id: MonitorId,
    app: String,
    alive: AtomicBool,
    state: Mutex<MonitorState>,
    fetcher: Arc<dyn Fetcher>,
    events: EventSender,
}

/// The current output view of an application.
///
/// Cloning yields another handle to the same view.
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<MonitorShared>,
}

impl Monitor {
    /// Only `Application::open_monitor` creates monitors.
    pub(crate) fn new(
        app: &str,
        renderer: Box<dyn Renderer>,
        fetcher: Arc<dyn Fetcher>,
        events: EventSender,
    ) -> Self {
        let shared = MonitorShared {
            id: MonitorId(NEXT_MONITOR_ID.fetch_add(1, Ordering::Relaxed)),
            app: app.to_string(),
            alive: AtomicBool::new(true),
            state: Mutex::new(MonitorState {
                renderer,
                lines: Vec::new(),
                frames: HashMap::new(),
                next_element: 0,
            }),
            fetcher,
            events,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn id(&self) -> MonitorId {
        self.shared.id
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Run `f` against the view state if the monitor is still open.
    fn with_live_state<R>(&self, f: impl FnOnce(&mut MonitorState) -> R) -> Option<R> {
        if !self.is_alive() {
            return None;
        }
        let mut state = lock(&self.shared.state);
        // `close` flips the flag while holding this lock.
        if !self.is_alive() {
            return None;
        }
        Some(f(&mut state))
    }

    /// Append a text line, indented with the `+--` marker for `indent > 0`.
    pub fn write_line(&self, text: impl AsRef<str>, indent: usize) -> Option<ElementId> {
        let text = indent_text(text.as_ref(), indent);
        self.with_live_state(|state| {
            let id = state.allocate();
            state.renderer.append_text(id, &text);
            state.lines.push(Line::Text { id, text, indent });
            id
        })
    }

    /// Append an unindented text line.
    pub fn write(&self, text: impl AsRef<str>) -> Option<ElementId> {
        self.write_line(text, 0)
    }

    pub fn heading(&self, text: impl AsRef<str>, level: HeadingLevel) -> Option<ElementId> {
        let text = text.as_ref().to_string();
        self.with_live_state(|state| {
            let id = state.allocate();
            state.renderer.append_heading(id, level, &text);
            state.lines.push(Line::Heading { id, level, text });
            id
        })
    }

    pub fn h1(&self, text: impl AsRef<str>) -> Option<ElementId> {
        self.heading(text, HeadingLevel::H1)
    }

    pub fn h2(&self, text: impl AsRef<str>) -> Option<ElementId> {
        self.heading(text, HeadingLevel::H2)
    }

    pub fn h3(&self, text: impl AsRef<str>) -> Option<ElementId> {
        self.heading(text, HeadingLevel::H3)
    }

    /// Append a horizontal rule.
    pub fn separator(&self) -> Option<ElementId> {
        self.with_live_state(|state| {
            let id = state.allocate();
            state.renderer.append_separator(id);
            state.lines.push(Line::Separator { id });
            id
        })
    }

    /// Append an already decoded image.
    pub fn write_image(&self, image: ImageData) -> Option<ElementId> {
        self.with_live_state(|state| {
            let id = state.allocate();
            state.renderer.append_image(id, &image);
            state.lines.push(Line::Image { id, image });
            id
        })
    }

    /// Reserve the next position for content that arrives later.
    ///
    /// On a closed monitor the returned slot is inert.
    pub fn add_slot(&self) -> Slot {
        let id = self.with_live_state(|state| {
            let id = state.allocate();
            state.renderer.append_slot(id);
            state.lines.push(Line::Slot { id, content: None });
            id
        });
        Slot {
            monitor: Arc::downgrade(&self.shared),
            id: id.unwrap_or(ElementId(u64::MAX)),
        }
    }

    /// Reserve the next position for a nested block written later.
    ///
    /// The frame keeps its position however much is appended after it. On a
    /// closed monitor the returned frame is inert.
    pub fn add_frame_slot(&self) -> Frame {
        let id = self.with_live_state(|state| {
            let id = state.allocate();
            let renderer = state.renderer.append_frame(id);
            state.frames.insert(id, renderer);
            state.lines.push(Line::Frame {
                id,
                lines: Vec::new(),
            });
            id
        });
        Frame {
            monitor: Arc::downgrade(&self.shared),
            id: id.unwrap_or(ElementId(u64::MAX)),
        }
    }

    /// Download an image and append it. Blocks the calling thread.
    ///
    /// Failures are logged and reported on the status line; nothing is
    /// written. If the monitor closes while the download is in flight the
    /// decoded image is dropped.
    pub fn write_image_from_url(&self, url: &str) -> Option<ElementId> {
        if !self.is_alive() {
            return None;
        }

        self.status(Some(format!("Downloading image from {}", url)));
        let image = match fetch::fetch_image(self.shared.fetcher.as_ref(), url) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(app = %self.shared.app, url, error = %err, "image download failed");
                self.status(Some(format!("Error: {}", err)));
                return None;
            }
        };
        self.status(None);

        let written = self.write_image(image);
        if written.is_none() {
            tracing::debug!(app = %self.shared.app, url, "monitor closed during download");
        }
        written
    }

    /// Remove everything rendered so far; the monitor stays open.
    ///
    /// Slots and frames handed out before the clear become inert.
    pub fn clear(&self) {
        self.with_live_state(|state| {
            state.lines.clear();
            state.frames.clear();
            state.renderer.clear();
        });
    }

    /// Close the monitor. Idempotent; every later write is a no-op.
    pub fn close(&self) {
        let mut state = lock(&self.shared.state);
        if !self.shared.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        state.lines.clear();
        state.frames.clear();
        state.renderer.destroy();
        drop(state);

        tracing::debug!(app = %self.shared.app, monitor = self.shared.id.0, "monitor closed");
        let _ = self.shared.events.send(ShellEvent::MonitorClosed {
            app: self.shared.app.clone(),
            monitor_id: self.shared.id,
        });
    }

    /// Snapshot of the rendered lines, in output order.
    pub fn lines(&self) -> Vec<Line> {
        lock(&self.shared.state).lines.clone()
    }

    pub fn line_count(&self) -> usize {
        lock(&self.shared.state).lines.len()
    }

    fn status(&self, message: Option<String>) {
        let _ = self.shared.events.send(ShellEvent::Status {
            app: self.shared.app.clone(),
            message,
        });
    }
}

impl MonitorShared {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn fill_slot(&self, id: ElementId, content: SlotContent) -> bool {
        if !self.is_alive() {
            return false;
        }
        let mut state = lock(&self.state);
        if !self.is_alive() {
            return false;
        }
        let state = &mut *state;
        for line in state.lines.iter_mut() {
            let (renderer, slot) = match line {
                Line::Slot {
                    id: slot_id,
                    content: slot,
                } if *slot_id == id => (&mut state.renderer, slot),
                Line::Frame {
                    id: frame_id,
                    lines,
                } => {
                    let Some(Line::Slot { content: slot, .. }) =
                        lines.iter_mut().find(|line| line.id() == id)
                    else {
                        continue;
                    };
                    let Some(renderer) = state.frames.get_mut(frame_id) else {
                        continue;
                    };
                    (renderer, slot)
                }
                _ => continue,
            };
            renderer.fill_slot(id, &content);
            *slot = Some(content);
            return true;
        }
        false
    }

    /// Append one element to a frame, with the same liveness rules as a
    /// top-level write. `None` once the monitor is closed or cleared.
    fn append_to_frame(
        &self,
        frame: ElementId,
        build: impl FnOnce(ElementId, &mut dyn Renderer) -> Line,
    ) -> Option<ElementId> {
        if !self.is_alive() {
            return None;
        }
        let mut state = lock(&self.state);
        if !self.is_alive() {
            return None;
        }
        let state = &mut *state;
        let renderer = state.frames.get_mut(&frame)?;
        let Some(Line::Frame { lines, .. }) =
            state.lines.iter_mut().find(|line| line.id() == frame)
        else {
            return None;
        };
        let id = ElementId(state.next_element);
        state.next_element += 1;
        lines.push(build(id, renderer.as_mut()));
        Some(id)
    }
}

/// A nested block inside a monitor, written from any thread after the
/// surrounding output has moved on.
///
/// Like a slot, a frame never keeps its monitor alive and every write is a
/// no-op once the monitor is closed, cleared, or dropped.
#[derive(Clone)]
pub struct Frame {
    monitor: Weak<MonitorShared>,
    id: ElementId,
}

impl Frame {
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.monitor.upgrade().is_some_and(|m| m.is_alive())
    }

    fn append(
        &self,
        build: impl FnOnce(ElementId, &mut dyn Renderer) -> Line,
    ) -> Option<ElementId> {
        self.monitor.upgrade()?.append_to_frame(self.id, build)
    }

    /// Append a text line, indented with the `+--` marker for `indent > 0`.
    pub fn write_line(&self, text: impl AsRef<str>, indent: usize) -> Option<ElementId> {
        let text = indent_text(text.as_ref(), indent);
        self.append(|id, renderer| {
            renderer.append_text(id, &text);
            Line::Text { id, text, indent }
        })
    }

    pub fn write(&self, text: impl AsRef<str>) -> Option<ElementId> {
        self.write_line(text, 0)
    }

    pub fn heading(&self, text: impl AsRef<str>, level: HeadingLevel) -> Option<ElementId> {
        let text = text.as_ref().to_string();
        self.append(|id, renderer| {
            renderer.append_heading(id, level, &text);
            Line::Heading { id, level, text }
        })
    }

    pub fn h1(&self, text: impl AsRef<str>) -> Option<ElementId> {
        self.heading(text, HeadingLevel::H1)
    }

    pub fn separator(&self) -> Option<ElementId> {
        self.append(|id, renderer| {
            renderer.append_separator(id);
            Line::Separator { id }
        })
    }

    pub fn write_image(&self, image: ImageData) -> Option<ElementId> {
        self.append(|id, renderer| {
            renderer.append_image(id, &image);
            Line::Image { id, image }
        })
    }

    /// Reserve a position inside the frame.
    pub fn add_slot(&self) -> Slot {
        let id = self.append(|id, renderer| {
            renderer.append_slot(id);
            Line::Slot { id, content: None }
        });
        Slot {
            monitor: self.monitor.clone(),
            id: id.unwrap_or(ElementId(u64::MAX)),
        }
    }

    /// Download an image into the frame. Blocks the calling thread.
    pub fn write_image_from_url(&self, url: &str) -> Option<ElementId> {
        let fetcher = match self.monitor.upgrade() {
            Some(monitor) if monitor.is_alive() => monitor.fetcher.clone(),
            _ => return None,
        };

        match fetch::fetch_image(fetcher.as_ref(), url) {
            Ok(image) => self.write_image(image),
            Err(err) => {
                tracing::warn!(url, error = %err, "frame image download failed");
                None
            }
        }
    }
}

/// A reserved position inside a monitor, filled later from any thread.
///
/// A slot never keeps its monitor alive; once the monitor is closed,
/// cleared, or dropped, writes are discarded.
#[derive(Clone)]
pub struct Slot {
    monitor: Weak<MonitorShared>,
    id: ElementId,
}

impl Slot {
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.monitor.upgrade().is_some_and(|m| m.is_alive())
    }

    /// Set or replace the slot's content. Returns whether it was applied.
    pub fn write(&self, content: impl Into<SlotContent>) -> bool {
        match self.monitor.upgrade() {
            Some(monitor) => monitor.fill_slot(self.id, content.into()),
            None => false,
        }
    }

    /// Download an image into this slot. Blocks the calling thread.
    pub fn write_image_from_url(&self, url: &str) -> bool {
        let fetcher = match self.monitor.upgrade() {
            Some(monitor) if monitor.is_alive() => monitor.fetcher.clone(),
            _ => return false,
        };

        match fetch::fetch_image(fetcher.as_ref(), url) {
            Ok(image) => self.write(image),
            Err(err) => {
                tracing::warn!(url, error = %err, "slot image download failed");
                false
            }
        }
    }
}
