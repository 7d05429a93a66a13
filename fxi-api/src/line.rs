//! Rendered line model - what a monitor holds, in output order.

use std::fmt;
use std::sync::Arc;

/// Identifier of a rendered element within one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// Heading size. Only three levels exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    /// Map a numeric level (1-3) to a heading level.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(HeadingLevel::H1),
            2 => Some(HeadingLevel::H2),
            3 => Some(HeadingLevel::H3),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            HeadingLevel::H1 => 1,
            HeadingLevel::H2 => 2,
            HeadingLevel::H3 => 3,
        }
    }
}

/// A decoded RGBA8 image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Content written into a slot. A later write replaces an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotContent {
    Text(String),
    Image(ImageData),
}

impl From<String> for SlotContent {
    fn from(text: String) -> Self {
        SlotContent::Text(text)
    }
}

impl From<&str> for SlotContent {
    fn from(text: &str) -> Self {
        SlotContent::Text(text.to_owned())
    }
}

impl From<ImageData> for SlotContent {
    fn from(image: ImageData) -> Self {
        SlotContent::Image(image)
    }
}

/// One rendered element of a monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text {
        id: ElementId,
        /// Text as rendered, indentation marker included.
        text: String,
        indent: usize,
    },
    Heading {
        id: ElementId,
        level: HeadingLevel,
        text: String,
    },
    Separator {
        id: ElementId,
    },
    Image {
        id: ElementId,
        image: ImageData,
    },
    /// Reserved position; `None` until something is written into it.
    Slot {
        id: ElementId,
        content: Option<SlotContent>,
    },
    /// Nested block holding its own lines, written after the fact.
    Frame {
        id: ElementId,
        lines: Vec<Line>,
    },
}

impl Line {
    pub fn id(&self) -> ElementId {
        match self {
            Line::Text { id, .. }
            | Line::Heading { id, .. }
            | Line::Separator { id }
            | Line::Image { id, .. }
            | Line::Slot { id, .. }
            | Line::Frame { id, .. } => *id,
        }
    }

    /// Lines nested inside a frame; empty for every other line.
    pub fn children(&self) -> &[Line] {
        match self {
            Line::Frame { lines, .. } => lines,
            _ => &[],
        }
    }

    /// Text shown by this line, if it shows any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Line::Text { text, .. } | Line::Heading { text, .. } => Some(text),
            Line::Slot {
                content: Some(SlotContent::Text(text)),
                ..
            } => Some(text),
            _ => None,
        }
    }
}

/// Apply the presentational indentation marker: `+` followed by
/// `indent - 1` dashes. Level 0 leaves the text untouched.
pub fn indent_text(text: &str, indent: usize) -> String {
    if indent == 0 {
        return text.to_owned();
    }
    format!("+{}{}", "-".repeat(indent - 1), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_text_levels() {
        assert_eq!(indent_text("x", 0), "x");
        assert_eq!(indent_text("x", 1), "+x");
        assert_eq!(indent_text("x", 3), "+--x");
    }

    #[test]
    fn test_heading_level_bounds() {
        assert_eq!(HeadingLevel::from_level(0), None);
        assert_eq!(HeadingLevel::from_level(2), Some(HeadingLevel::H2));
        assert_eq!(HeadingLevel::from_level(4), None);
        assert_eq!(HeadingLevel::H3.level(), 3);
    }

    #[test]
    fn test_slot_text_is_visible_through_line_text() {
        let line = Line::Slot {
            id: ElementId(4),
            content: Some("filled".into()),
        };
        assert_eq!(line.text(), Some("filled"));
        assert_eq!(line.id(), ElementId(4));
    }

    #[test]
    fn test_frame_exposes_children_but_no_text() {
        let frame = Line::Frame {
            id: ElementId(2),
            lines: vec![Line::Separator { id: ElementId(3) }],
        };
        assert_eq!(frame.text(), None);
        assert_eq!(frame.children().len(), 1);
        assert!(Line::Separator { id: ElementId(0) }.children().is_empty());
    }
}
