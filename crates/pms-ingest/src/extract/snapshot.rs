//! Process snapshot extractor
//!
//! `log,process` text files are process listings captured on the asset. They
//! are kept verbatim; the only derived metric is the line count.

use std::path::Path;

use super::{read_text_lossy, text_lines, ExtractError, Extraction};
use crate::models::NewDetail;

pub const SNAPSHOT_ITEM_NAME: &str = "Process List";

pub fn extract(path: &Path) -> Result<Extraction, ExtractError> {
    let content = read_text_lossy(path)?;
    Ok(Extraction::Rows(vec![summarize(content)]))
}

pub fn summarize(content: String) -> NewDetail {
    let line_count = text_lines(&content).count();
    NewDetail {
        item_name: SNAPSHOT_ITEM_NAME.to_string(),
        value: Some(line_count.to_string()),
        raw_data: Some(serde_json::Value::String(content)),
    }
}
