pub mod canvas;
pub mod color;
pub mod dual;
pub mod surface;

pub use color::Rgba8;
pub use dual::{DisplayViewport, DualSurfaceRenderer, TickReport};
pub use surface::Surface;
