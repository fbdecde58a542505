use std::path::Path;

use ndarray::Array4;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{
        Session,
        builder::{GraphOptimizationLevel, SessionBuilder},
    },
};
use snafu::ResultExt;

use crate::{
    error::{DocparseError, OrtInitSnafu},
    layout::element::Candidate,
};

/// Static description of an ONNX model this crate knows how to drive.
pub trait Model {
    type Config;

    const INPUT_NAME: &'static str;
    const MODEL_NAME: &'static str;

    /// Location of the `.onnx` file.
    fn path(&self) -> &Path;
    fn config(&self) -> &Self::Config;
}

/// One forward pass of a layout detection model.
///
/// Takes the letterboxed `(1, 3, S, S)` tensor and returns every decoded
/// candidate, unfiltered, in tensor pixel space.
pub trait LayoutDetector: Send {
    /// Acquires whatever the detector needs before the first page, such as
    /// a model session. Runs once per document, without a timeout.
    fn prepare(&mut self) -> Result<(), DocparseError> {
        Ok(())
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Candidate>, DocparseError>;
}

/// common session builder
///
/// Accelerated providers are registered ahead of the CPU provider, so a
/// missing accelerator falls back to CPU when the session is built.
pub fn session_builder(intra_threads: usize) -> Result<SessionBuilder, DocparseError> {
    let session_builder = Session::builder()
        .context(OrtInitSnafu { stage: "builder" })?
        .with_execution_providers(vec![
            #[cfg(all(feature = "coreml", target_os = "macos"))]
            {
                use ort::execution_providers::CoreMLExecutionProvider;
                use ort::execution_providers::coreml::*;
                CoreMLExecutionProvider::default()
                    .with_model_format(CoreMLModelFormat::MLProgram)
                    .build()
            },
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                CUDAExecutionProvider::default().build()
            },
            CPUExecutionProvider::default().build(),
        ])
        .context(OrtInitSnafu { stage: "provider" })?
        .with_optimization_level(GraphOptimizationLevel::Level1)
        .context(OrtInitSnafu {
            stage: "optimization",
        })?
        .with_intra_threads(intra_threads)
        .context(OrtInitSnafu {
            stage: "intra-threads",
        })?;

    Ok(session_builder)
}
