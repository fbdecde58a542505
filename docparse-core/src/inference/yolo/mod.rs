pub mod model;
pub mod output;
pub mod session;

pub use model::{LayoutModel, LayoutModelConfig};
pub use session::{LazySession, YoloSession};
