//! In-memory surface that records every render call.
//!
//! Used for headless runs and throughout the tests.

use std::sync::{Arc, Mutex};

use fxi_api::{ElementId, HeadingLevel, ImageData, Renderer, SlotContent, Surface};

use crate::lock;

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    Text(ElementId, String),
    Heading(ElementId, HeadingLevel, String),
    Separator(ElementId),
    Image(ElementId, u32, u32),
    Slot(ElementId),
    Fill(ElementId, SlotContent),
    Frame(ElementId),
    /// A call made on the renderer of the given frame.
    InFrame(ElementId, Box<RenderOp>),
    Clear,
    Destroy,
}

type OpLog = Arc<Mutex<Vec<RenderOp>>>;

struct View {
    app: String,
    ops: OpLog,
}

/// A surface whose views append to shared logs.
#[derive(Clone, Default)]
pub struct MemorySurface {
    views: Arc<Mutex<Vec<View>>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of views opened so far.
    pub fn view_count(&self) -> usize {
        lock(&self.views).len()
    }

    /// Recorded calls of the `index`-th opened view (empty if out of range).
    pub fn ops(&self, index: usize) -> Vec<RenderOp> {
        lock(&self.views)
            .get(index)
            .map(|view| lock(&view.ops).clone())
            .unwrap_or_default()
    }

    /// Indices of the views opened for `app`, in opening order.
    pub fn views_for(&self, app: &str) -> Vec<usize> {
        lock(&self.views)
            .iter()
            .enumerate()
            .filter(|(_, view)| view.app == app)
            .map(|(i, _)| i)
            .collect()
    }
}

impl Surface for MemorySurface {
    fn open_view(&self, app: &str) -> Box<dyn Renderer> {
        let ops = OpLog::default();
        lock(&self.views).push(View {
            app: app.to_string(),
            ops: ops.clone(),
        });
        Box::new(MemoryRenderer { ops, frame: None })
    }
}

/// Frame renderers share their parent's log and tag what they record.
struct MemoryRenderer {
    ops: OpLog,
    frame: Option<ElementId>,
}

impl MemoryRenderer {
    fn record(&self, op: RenderOp) {
        let op = match self.frame {
            Some(frame) => RenderOp::InFrame(frame, Box::new(op)),
            None => op,
        };
        lock(&self.ops).push(op);
    }
}

impl Renderer for MemoryRenderer {
    fn append_text(&mut self, id: ElementId, text: &str) {
        self.record(RenderOp::Text(id, text.to_string()));
    }

    fn append_heading(&mut self, id: ElementId, level: HeadingLevel, text: &str) {
        self.record(RenderOp::Heading(id, level, text.to_string()));
    }

    fn append_separator(&mut self, id: ElementId) {
        self.record(RenderOp::Separator(id));
    }

    fn append_image(&mut self, id: ElementId, image: &ImageData) {
        self.record(RenderOp::Image(id, image.width, image.height));
    }

    fn append_slot(&mut self, id: ElementId) {
        self.record(RenderOp::Slot(id));
    }

    fn fill_slot(&mut self, id: ElementId, content: &SlotContent) {
        self.record(RenderOp::Fill(id, content.clone()));
    }

    fn append_frame(&mut self, id: ElementId) -> Box<dyn Renderer> {
        self.record(RenderOp::Frame(id));
        Box::new(MemoryRenderer {
            ops: self.ops.clone(),
            frame: Some(id),
        })
    }

    fn clear(&mut self) {
        self.record(RenderOp::Clear);
    }

    fn destroy(&mut self) {
        self.record(RenderOp::Destroy);
    }
}
