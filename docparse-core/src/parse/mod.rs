pub mod output;
pub mod parser;
pub mod runtime;

pub use output::{JsonLinesWriter, open_output};
pub use parser::{LayoutParser, PagePolicy, ParserConfig, ParserConfigBuilder};
pub use runtime::block_on;
