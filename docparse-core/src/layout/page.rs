use serde::Serialize;

use crate::{
    error::{DocparseError, ErrorKind},
    layout::element::Region,
};

/// Regions detected on one page. `page` is 1-based.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageResult {
    pub page: usize,
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

/// A page that failed and was skipped. `page` is 1-based.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageError {
    pub page: usize,
    pub error: ErrorInfo,
}

impl PageError {
    pub fn new(page: usize, err: &DocparseError) -> Self {
        Self {
            page,
            error: ErrorInfo {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}

/// What the parser reports for each page, in page order.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PageOutcome {
    Page(PageResult),
    Failed(PageError),
}

impl PageOutcome {
    pub fn page(&self) -> usize {
        match self {
            PageOutcome::Page(result) => result.page,
            PageOutcome::Failed(failed) => failed.page,
        }
    }
}
