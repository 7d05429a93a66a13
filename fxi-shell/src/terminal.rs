//! Line-oriented terminal surface.
//!
//! Every rendered element becomes one stdout line prefixed by its
//! application title. Slots print when filled, so late content shows up
//! with its slot number rather than at its original position. Frame content
//! is marked with a `|` per nesting level.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use fxi_api::{ElementId, HeadingLevel, ImageData, Renderer, ShellEvent, SlotContent, Surface};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::lock;

/// A writer shared by the renderer, the prompt and the status printer.
#[derive(Clone)]
pub struct Output {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Output {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Write one line and flush. Write errors are logged, never returned.
    pub fn line(&self, text: &str) {
        let mut out = lock(&self.inner);
        if let Err(e) = writeln!(out, "{}", text).and_then(|_| out.flush()) {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }
}

static NEXT_VIEW: AtomicU64 = AtomicU64::new(1);

pub struct TerminalSurface {
    out: Output,
}

impl TerminalSurface {
    pub fn new(out: Output) -> Self {
        Self { out }
    }
}

impl Surface for TerminalSurface {
    fn open_view(&self, app: &str) -> Box<dyn Renderer> {
        Box::new(TerminalRenderer {
            app: app.to_string(),
            view: NEXT_VIEW.fetch_add(1, Ordering::Relaxed),
            nesting: String::new(),
            out: self.out.clone(),
        })
    }
}

struct TerminalRenderer {
    app: String,
    view: u64,
    nesting: String,
    out: Output,
}

impl TerminalRenderer {
    fn emit(&self, text: &str) {
        self.out
            .line(&format!("[{}] {}{}", self.app, self.nesting, text));
    }
}

impl Renderer for TerminalRenderer {
    fn append_text(&mut self, _id: ElementId, text: &str) {
        self.emit(text);
    }

    fn append_heading(&mut self, _id: ElementId, level: HeadingLevel, text: &str) {
        let marks = "#".repeat(level.level() as usize);
        self.emit(&format!("{} {}", marks, text));
    }

    fn append_separator(&mut self, _id: ElementId) {
        self.emit(&"-".repeat(40));
    }

    fn append_image(&mut self, _id: ElementId, image: &ImageData) {
        self.emit(&describe_image(image));
    }

    fn append_slot(&mut self, _id: ElementId) {}

    fn fill_slot(&mut self, id: ElementId, content: &SlotContent) {
        let body = match content {
            SlotContent::Text(text) => text.clone(),
            SlotContent::Image(image) => describe_image(image),
        };
        self.emit(&format!("({}.{}) {}", self.view, id.0, body));
    }

    fn append_frame(&mut self, _id: ElementId) -> Box<dyn Renderer> {
        Box::new(TerminalRenderer {
            app: self.app.clone(),
            view: self.view,
            nesting: format!("{}| ", self.nesting),
            out: self.out.clone(),
        })
    }

    fn clear(&mut self) {
        self.emit(&"=".repeat(40));
    }

    fn destroy(&mut self) {
        tracing::trace!(app = %self.app, view = self.view, "view destroyed");
    }
}

fn describe_image(image: &ImageData) -> String {
    format!("[image {}x{}]", image.width, image.height)
}

/// Text printed for an event, if it is one the user should see.
pub fn describe_event(event: &ShellEvent) -> Option<String> {
    match event {
        ShellEvent::Status { app, message } => Some(format!(
            "[{}] status: {}",
            app,
            message.as_deref().unwrap_or("-")
        )),
        ShellEvent::CommandFailed {
            app,
            command,
            error,
        } => Some(format!("[{}] {} failed: {}", app, command, error)),
        ShellEvent::TaskFailed { app, task, error } => {
            Some(format!("[{}] task {} failed: {}", app, task, error))
        }
        _ => None,
    }
}

/// Print status events until every sender is gone.
pub fn spawn_status_printer(
    mut events: broadcast::Receiver<ShellEvent>,
    out: Output,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("status".to_string())
        .spawn(move || {
            loop {
                match events.blocking_recv() {
                    Ok(event) => {
                        if let Some(text) = describe_event(&event) {
                            out.line(&text);
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "status printer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
}


#[cfg(test)]
mod tests {
    use super::test_output::Captured;
    use super::*;

    #[test]
    fn test_renderer_prefixes_app_title() {
        let (out, captured) = Captured::output();
        let surface = TerminalSurface::new(out);
        let mut view = surface.open_view("reader");
        view.append_heading(ElementId(0), HeadingLevel::H2, "Page 1 of 3");
        view.append_text(ElementId(1), "+- indented");
        view.append_slot(ElementId(2));

        assert_eq!(
            captured.lines(),
            vec!["[reader] ## Page 1 of 3", "[reader] +- indented"]
        );
    }

    #[test]
    fn test_slot_fill_is_printed_with_its_number() {
        let (out, captured) = Captured::output();
        let mut view = TerminalSurface::new(out).open_view("images");
        view.append_slot(ElementId(4));
        view.fill_slot(ElementId(4), &SlotContent::Image(ImageData::new(2, 1, vec![0; 8])));

        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[images] ("));
        assert!(lines[0].ends_with(".4) [image 2x1]"));
    }

    #[test]
    fn test_frame_content_is_marked() {
        let (out, captured) = Captured::output();
        let mut view = TerminalSurface::new(out).open_view("imdb");
        let mut frame = view.append_frame(ElementId(1));
        view.append_text(ElementId(2), "next movie");
        frame.append_text(ElementId(3), "+7.9 (300 votes)");

        assert_eq!(
            captured.lines(),
            vec!["[imdb] next movie", "[imdb] | +7.9 (300 votes)"]
        );
    }

    #[test]
    fn test_describe_status_events() {
        let set = ShellEvent::Status {
            app: "a".into(),
            message: Some("Downloading image from http://x".into()),
        };
        let reset = ShellEvent::Status {
            app: "a".into(),
            message: None,
        };
        assert_eq!(
            describe_event(&set).unwrap(),
            "[a] status: Downloading image from http://x"
        );
        assert_eq!(describe_event(&reset).unwrap(), "[a] status: -");
        assert!(describe_event(&ShellEvent::AppOpened { app: "a".into() }).is_none());
    }

    #[test]
    fn test_status_printer_stops_when_bus_closes() {
        let (out, captured) = Captured::output();
        let (tx, rx) = fxi_kernel::event_channel();
        let printer = spawn_status_printer(rx, out).unwrap();
        tx.send(ShellEvent::Status {
            app: "t".into(),
            message: Some("hi".into()),
        })
        .unwrap();
        drop(tx);
        printer.join().unwrap();
        assert_eq!(captured.lines(), vec!["[t] status: hi"]);
    }
}
