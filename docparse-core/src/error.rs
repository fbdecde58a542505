use std::time::Duration;

use serde::Serialize;
use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DocparseError {
    #[snafu(display("Ort Session init stage `{}` error: {}", stage, source))]
    OrtInit {
        source: ort::error::Error,
        stage: String,
    },
    #[snafu(display("Build Tensor for `{}` error: {}", stage, source))]
    Tensor {
        source: ort::error::Error,
        stage: String,
    },
    #[snafu(display("Onnx Inference error: {}", source))]
    Inference { source: ort::error::Error },
    #[snafu(display("Onnx Input can not found {}", input_name))]
    NotFoundInput { input_name: String },
    #[snafu(display("Onnx Output can not found {}", output_name))]
    NotFoundOutput { output_name: String },
    #[snafu(display("Onnx Output shape {:?} is not a known detection layout", shape))]
    UnexpectedOutput { shape: Vec<usize> },
    #[snafu(display("Ndarray Shape error at stage `{}`: {}", stage, source))]
    Shape {
        source: ndarray::ShapeError,
        stage: String,
    },
    #[snafu(display("Inference did not finish within {:?}", timeout))]
    InferenceTimeout { timeout: Duration },
    #[snafu(display("Inference task failed: {}", source))]
    InferenceTask { source: tokio::task::JoinError },
    #[snafu(display("Render task failed: {}", source))]
    RenderTask { source: tokio::task::JoinError },
    #[snafu(display("Build async runtime error: {}", source))]
    Runtime { source: std::io::Error },
    #[snafu(display("Model file `{}` does not exist", path))]
    ModelNotFound { path: String },
    #[snafu(display("Page index {} out of range (0..{})", page, page_count))]
    PageOutOfRange { page: usize, page_count: usize },
    #[snafu(display("Page image is degenerate: {}x{}", width, height))]
    DegeneratePage { width: usize, height: usize },
    #[snafu(display(
        "Image buffer of {} bytes does not match {}x{}x3",
        len,
        width,
        height
    ))]
    ImageBuffer {
        width: usize,
        height: usize,
        len: usize,
    },
    #[snafu(display("Pdfium `{}` error {}", stage, source))]
    Pdfium {
        source: pdfium_render::prelude::PdfiumError,
        stage: String,
    },
    #[snafu(display("Label map `{}` is invalid: {}", path, source))]
    LabelMap {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Read `{}` error: {}", path, source))]
    IoRead {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Write `{}` error: {}", path, source))]
    IoWrite {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Image Write error: {}", source))]
    ImageWrite {
        source: image::ImageError,
        path: String,
    },
    #[snafu(display("Serialize page {} error: {}", page, source))]
    Json {
        source: serde_json::Error,
        page: usize,
    },
}

/// Coarse error classes reported per page in the JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    DegeneratePage,
    Inference,
    Output,
}

impl DocparseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocparseError::ModelNotFound { .. }
            | DocparseError::PageOutOfRange { .. }
            | DocparseError::ImageBuffer { .. }
            | DocparseError::Pdfium { .. }
            | DocparseError::RenderTask { .. }
            | DocparseError::LabelMap { .. }
            | DocparseError::IoRead { .. } => ErrorKind::Input,
            DocparseError::DegeneratePage { .. } => ErrorKind::DegeneratePage,
            DocparseError::OrtInit { .. }
            | DocparseError::Tensor { .. }
            | DocparseError::Inference { .. }
            | DocparseError::NotFoundInput { .. }
            | DocparseError::NotFoundOutput { .. }
            | DocparseError::UnexpectedOutput { .. }
            | DocparseError::Shape { .. }
            | DocparseError::InferenceTimeout { .. }
            | DocparseError::InferenceTask { .. }
            | DocparseError::Runtime { .. } => ErrorKind::Inference,
            DocparseError::IoWrite { .. }
            | DocparseError::ImageWrite { .. }
            | DocparseError::Json { .. } => ErrorKind::Output,
        }
    }

    /// Errors that would repeat on every remaining page of the document.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DocparseError::OrtInit { .. }
                | DocparseError::NotFoundInput { .. }
                | DocparseError::NotFoundOutput { .. }
                | DocparseError::Runtime { .. }
                | DocparseError::ModelNotFound { .. }
                | DocparseError::IoWrite { .. }
                | DocparseError::Json { .. }
        )
    }
}
