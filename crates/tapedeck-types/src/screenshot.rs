//! Screen captures and their cached difference images.

use serde::{Deserialize, Serialize};

/// A persisted screen capture.
///
/// `png_diff_data` and `png_diff_mask_data` start out empty and are filled in
/// once by the screenshot diff pass; they are never overwritten afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: i64,
    pub recording_timestamp: i64,
    pub timestamp: i64,
    /// PNG-encoded capture.
    #[serde(skip)]
    pub png_data: Vec<u8>,
    /// PNG-encoded difference against the previous capture.
    #[serde(skip)]
    pub png_diff_data: Option<Vec<u8>>,
    /// PNG-encoded mask of the pixels that changed.
    #[serde(skip)]
    pub png_diff_mask_data: Option<Vec<u8>>,
}

impl Screenshot {
    /// Whether both diff artifacts are already cached.
    pub fn has_cached_diffs(&self) -> bool {
        self.png_diff_data.is_some() && self.png_diff_mask_data.is_some()
    }
}

/// A capture as handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScreenshot {
    pub png_data: Vec<u8>,
}

impl NewScreenshot {
    pub fn new(png_data: Vec<u8>) -> Self {
        Self { png_data }
    }
}
