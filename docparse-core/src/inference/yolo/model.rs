use std::path::{Path, PathBuf};

use snafu::ensure;

use crate::{
    analysis::labels::DOCLAYNET_LABELS,
    consts::{DEFAULT_MODEL_PATH, MODEL_INPUT_NAME},
    error::{DocparseError, ModelNotFoundSnafu},
    inference::model::Model,
};

/// YOLO layout model trained on DocLayNet, loaded from disk.
#[derive(Debug, Clone)]
pub struct LayoutModel {
    path: PathBuf,
    config: LayoutModelConfig,
}

#[derive(Debug, Clone)]
pub struct LayoutModelConfig {
    /// Threads ONNX Runtime may use inside one operator.
    pub intra_threads: usize,
    /// Classes the detection head scores, used to tell output layouts apart.
    pub num_classes: usize,
}

impl Default for LayoutModelConfig {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            num_classes: DOCLAYNET_LABELS.len(),
        }
    }
}

impl LayoutModel {
    pub fn new<P: Into<PathBuf>>(path: P, config: LayoutModelConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Fails with `ModelNotFound` unless the model path is a regular file.
    pub fn ensure_exists(&self) -> Result<(), DocparseError> {
        ensure!(
            self.path.is_file(),
            ModelNotFoundSnafu {
                path: self.path.to_string_lossy(),
            }
        );
        Ok(())
    }
}

impl Default for LayoutModel {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_PATH, LayoutModelConfig::default())
    }
}

impl Model for LayoutModel {
    type Config = LayoutModelConfig;

    const INPUT_NAME: &'static str = MODEL_INPUT_NAME;

    const MODEL_NAME: &'static str = "yolov8s-doclaynet";

    fn path(&self) -> &Path {
        &self.path
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
