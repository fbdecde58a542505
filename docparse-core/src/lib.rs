pub mod analysis;
pub mod consts;
pub mod error;
pub mod inference;
pub mod layout;
pub mod parse;
pub mod render;

// Re-export commonly used types
pub use error::{DocparseError, ErrorKind};
pub use inference::{
    LayoutDetector,
    yolo::{LayoutModel, LayoutModelConfig, LazySession},
};
pub use layout::{
    element::{Candidate, Region},
    page::{PageError, PageOutcome, PageResult},
};
pub use parse::{LayoutParser, PagePolicy, ParserConfig, ParserConfigBuilder};
pub use render::{PageImage, PdfiumRasterizer, Rasterizer};
