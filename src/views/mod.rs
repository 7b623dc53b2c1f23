pub mod structure_panel;
pub mod toolbar;
pub mod viewport_canvas;

pub use structure_panel::structure_panel;
pub use toolbar::toolbar;
pub use viewport_canvas::viewport_canvas;
