pub mod model;
pub mod yolo;

pub use model::{LayoutDetector, Model, session_builder};
