//! Pipeline settings shared by the writer, trimmer and diff pass.

use serde::Deserialize;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Rows queued per kind before the writer commits.
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    /// Compute and cache screenshot diffs when a recording is read.
    #[serde(default)]
    pub save_screenshot_diff: bool,
    /// Typed stop strings; each character is one key token.
    #[serde(default = "default_stop_strings")]
    pub stop_strings: Vec<String>,
    /// Stop sequences of named keys.
    #[serde(default = "default_special_stop_sequences")]
    pub special_stop_sequences: Vec<Vec<String>>,
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::MIN
}

fn default_stop_strings() -> Vec<String> {
    vec!["td.stop".to_string()]
}

fn default_special_stop_sequences() -> Vec<Vec<String>> {
    vec![vec!["ctrl".to_string(); 3]]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            save_screenshot_diff: false,
            stop_strings: default_stop_strings(),
            special_stop_sequences: default_special_stop_sequences(),
        }
    }
}

impl PipelineConfig {
    /// All stop sequences in match order: expanded strings, then special ones.
    pub fn stop_sequences(&self) -> Vec<Vec<String>> {
        self.stop_strings
            .iter()
            .map(|s| s.chars().map(String::from).collect())
            .chain(self.special_stop_sequences.iter().cloned())
            .collect()
    }
}
