use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{DocparseError, IoReadSnafu, LabelMapSnafu};

/// DocLayNet class names in model index order.
pub const DOCLAYNET_LABELS: [&str; 11] = [
    "Caption",
    "Footnote",
    "Formula",
    "List-item",
    "Page-footer",
    "Page-header",
    "Picture",
    "Section-header",
    "Table",
    "Text",
    "Title",
];

/// Region label: a resolved class name, or the raw class index when no
/// name is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegionLabel {
    Name(String),
    Index(usize),
}

/// Mapping from model class index to a human-readable name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(BTreeMap<usize, String>);

impl LabelMap {
    pub fn new(labels: BTreeMap<usize, String>) -> Self {
        Self(labels)
    }

    pub fn doclaynet() -> Self {
        Self(
            DOCLAYNET_LABELS
                .iter()
                .enumerate()
                .map(|(idx, name)| (idx, name.to_string()))
                .collect(),
        )
    }

    /// Loads a JSON object of the form `{"3": "table"}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DocparseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(IoReadSnafu {
            path: path.to_string_lossy(),
        })?;
        serde_json::from_str(&content).context(LabelMapSnafu {
            path: path.to_string_lossy(),
        })
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.0.get(&class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolves a class index through an optional label map.
///
/// Without a map, or when the map has no entry for the index, the raw index
/// is kept.
pub fn resolve_label(class_id: usize, labels: Option<&LabelMap>) -> RegionLabel {
    match labels.and_then(|labels| labels.get(class_id)) {
        Some(name) => RegionLabel::Name(name.to_string()),
        None => RegionLabel::Index(class_id),
    }
}

/// Outline color used when annotating a class.
pub const fn color(class_id: usize) -> [u8; 3] {
    match class_id % DOCLAYNET_LABELS.len() {
        0 => [255, 0, 0],     // Red
        1 => [0, 255, 0],     // Green
        2 => [0, 0, 255],     // Blue
        3 => [255, 255, 0],   // Yellow
        4 => [255, 0, 255],   // Magenta
        5 => [0, 255, 255],   // Cyan
        6 => [128, 0, 128],   // Purple
        7 => [255, 165, 0],   // Orange
        8 => [128, 128, 128], // Gray
        9 => [0, 128, 0],     // Dark Green
        _ => [255, 20, 147],  // Deep Pink
    }
}
