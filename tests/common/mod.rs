//! Common test utilities for genbank-dl integration tests

#[allow(dead_code)]
pub mod fake_tool;
#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fake_tool::*;
#[allow(unused_imports)]
pub use fixtures::*;

use genbank_dl::Config;
use std::path::Path;

/// Config rooted in `root` for the "gbbct" family, progress hidden by callers
#[allow(dead_code)]
pub fn test_config(root: &Path) -> Config {
    Config {
        source_path: root.to_path_buf(),
        date: "2024-06".to_string(),
        prefix: "gbbct".to_string(),
        concurrency: 2,
        ..Default::default()
    }
}
