use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use snafu::ResultExt;

use crate::{
    error::{DocparseError, IoWriteSnafu, JsonSnafu},
    layout::page::PageOutcome,
};

/// Writes one JSON object per page, newline terminated.
///
/// Each line is flushed as soon as it is written so partial results survive
/// an aborted run.
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    target: String,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W, target: impl Into<String>) -> Self {
        Self {
            writer,
            target: target.into(),
        }
    }

    pub fn write(&mut self, outcome: &PageOutcome) -> Result<(), DocparseError> {
        serde_json::to_writer(&mut self.writer, outcome).context(JsonSnafu {
            page: outcome.page(),
        })?;
        self.writer.write_all(b"\n").context(IoWriteSnafu {
            path: &self.target,
        })?;
        self.writer.flush().context(IoWriteSnafu {
            path: &self.target,
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Opens `path` for JSONL output, or stdout when no path is given.
pub fn open_output(
    path: Option<&Path>,
) -> Result<JsonLinesWriter<Box<dyn Write>>, DocparseError> {
    match path {
        Some(path) => {
            let target = path.to_string_lossy().to_string();
            let file = File::create(path).context(IoWriteSnafu { path: &target })?;
            Ok(JsonLinesWriter::new(
                Box::new(BufWriter::new(file)) as Box<dyn Write>,
                target,
            ))
        }
        None => Ok(JsonLinesWriter::new(
            Box::new(std::io::stdout().lock()) as Box<dyn Write>,
            "<stdout>",
        )),
    }
}
