//! Rendering boundary - the minimal interface a GUI toolkit has to satisfy.

use crate::{ElementId, HeadingLevel, ImageData, SlotContent};

/// A single view (a monitor frame, an application tab, a table).
///
/// Ids are allocated by the caller and are unique within the view.
pub trait Renderer: Send {
    fn append_text(&mut self, id: ElementId, text: &str);

    fn append_heading(&mut self, id: ElementId, level: HeadingLevel, text: &str);

    fn append_separator(&mut self, id: ElementId);

    fn append_image(&mut self, id: ElementId, image: &ImageData);

    /// Append an empty placeholder that is filled later.
    fn append_slot(&mut self, id: ElementId);

    /// Set or replace the content of a previously appended slot.
    fn fill_slot(&mut self, id: ElementId, content: &SlotContent);

    /// Append a nested block and return the renderer that writes into it.
    ///
    /// The nested renderer goes away with this view; clearing or destroying
    /// the parent needs no further calls on it.
    fn append_frame(&mut self, id: ElementId) -> Box<dyn Renderer>;

    /// Destroy every appended element; the view stays usable.
    fn clear(&mut self);

    /// Destroy the view itself. No calls follow.
    fn destroy(&mut self);
}

/// Creates views inside an application's tab.
pub trait Surface: Send + Sync {
    fn open_view(&self, app: &str) -> Box<dyn Renderer>;
}
