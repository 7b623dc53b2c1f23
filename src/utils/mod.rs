pub mod formatting;

pub use formatting::{annotation_title, percent, slice_position, slice_runs};
