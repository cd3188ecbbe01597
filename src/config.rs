//! Search configuration
//!
//! Every field has a default so a partial JSON document (or none at all)
//! yields a usable config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Page sizes offered by the results view
pub const ALLOWED_PAGE_SIZES: [usize; 4] = [25, 50, 100, 200];

mod defaults {
    pub fn default_page_size() -> usize {
        50
    }

    pub fn max_limit() -> usize {
        1000
    }

    pub fn max_offset() -> usize {
        1_000_000
    }

    pub fn regex_default_limit() -> usize {
        100
    }

    pub fn history_cap() -> usize {
        crate::search::DEFAULT_HISTORY_CAP
    }

    pub fn snippet_width() -> usize {
        50
    }

    pub fn highlight_window_tokens() -> u32 {
        20 // ~10 tokens each side of the match
    }

    pub fn query_timeout_ms() -> u64 {
        5_000
    }

    pub fn count_totals() -> bool {
        true
    }
}

/// How the regex builder hands the pattern to the REGEXP operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegexBinding {
    /// Bind the pattern as a statement parameter
    #[default]
    Parameter,
    /// Interpolate the quote-escaped pattern into the SQL text
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "defaults::default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "defaults::max_limit")]
    pub max_limit: usize,
    #[serde(default = "defaults::max_offset")]
    pub max_offset: usize,
    #[serde(default = "defaults::regex_default_limit")]
    pub regex_default_limit: usize,
    #[serde(default = "defaults::history_cap")]
    pub history_cap: usize,
    #[serde(default = "defaults::snippet_width")]
    pub snippet_width: usize,
    #[serde(default = "defaults::highlight_window_tokens")]
    pub highlight_window_tokens: u32,
    /// Zero disables the per-query deadline
    #[serde(default = "defaults::query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default)]
    pub regex_binding: RegexBinding,
    #[serde(default = "defaults::count_totals")]
    pub count_totals: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: defaults::default_page_size(),
            max_limit: defaults::max_limit(),
            max_offset: defaults::max_offset(),
            regex_default_limit: defaults::regex_default_limit(),
            history_cap: defaults::history_cap(),
            snippet_width: defaults::snippet_width(),
            highlight_window_tokens: defaults::highlight_window_tokens(),
            query_timeout_ms: defaults::query_timeout_ms(),
            regex_binding: RegexBinding::default(),
            count_totals: defaults::count_totals(),
        }
    }
}

impl SearchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let config: SearchConfig = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Load config from a JSON file, falling back to defaults when the file is missing
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            log::info!("[Config] {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
        Self::from_json_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Clamp values that would make the builders misbehave
    pub fn normalized(mut self) -> Self {
        if !ALLOWED_PAGE_SIZES.contains(&self.default_page_size) {
            log::warn!(
                "[Config] page size {} not in {:?}, using {}",
                self.default_page_size,
                ALLOWED_PAGE_SIZES,
                defaults::default_page_size()
            );
            self.default_page_size = defaults::default_page_size();
        }
        self.max_limit = self.max_limit.clamp(1, defaults::max_limit());
        self.max_offset = self.max_offset.min(defaults::max_offset());
        self.regex_default_limit = self.regex_default_limit.clamp(1, self.max_limit);
        self.history_cap = self.history_cap.max(1);
        self.highlight_window_tokens = self.highlight_window_tokens.clamp(1, 64);
        self
    }
}
