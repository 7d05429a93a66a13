//! FXI API - Shared types for the fxi application host.
//!
//! Everything the kernel and the shell exchange lives here: the rendered
//! line model, the renderer boundary, and the events applications publish.

mod event;
mod line;
mod render;
mod value;

pub use event::*;
pub use line::*;
pub use render::*;
pub use value::*;
