//! Performance dump extractor
//!
//! `disk,task` text files are `Key: Value` listings, one metric per line:
//!
//! ```text
//! CPU Usage: 42%
//! Memory: 12%
//! C:\ Free: 120 GB
//! ```
//!
//! Only the first `:` separates key from value, so values may contain colons.

use std::path::Path;

use super::{read_text_lossy, text_lines, ExtractError, Extraction};
use crate::models::NewDetail;

pub fn extract(path: &Path) -> Result<Extraction, ExtractError> {
    let content = read_text_lossy(path)?;
    Ok(Extraction::Rows(parse(&content)))
}

/// Parse `Key: Value` lines; blank lines and lines without `:` are skipped
pub fn parse(content: &str) -> Vec<NewDetail> {
    text_lines(content)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| NewDetail {
            item_name: key.trim().to_string(),
            value: Some(value.trim().to_string()),
            raw_data: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pairs(rows: &[NewDetail]) -> Vec<(&str, &str)> {
        rows.iter()
            .map(|r| (r.item_name.as_str(), r.value.as_deref().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_parse_skips_blank_and_colonless_lines() {
        let rows = parse("CPU: 42%\n\nBadLine\nMEM:  12%\n");
        assert_eq!(pairs(&rows), vec![("CPU", "42%"), ("MEM", "12%")]);
        assert!(rows.iter().all(|r| r.raw_data.is_none()));
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let rows = parse("Boot Time: 2025-01-15 09:30:00\r\n  C:\\ Free : 120 GB  \n");
        assert_eq!(
            pairs(&rows),
            vec![("Boot Time", "2025-01-15 09:30:00"), ("C", "\\ Free : 120 GB")]
        );
    }

    #[test]
    fn test_parse_splits_on_bare_carriage_returns() {
        let rows = parse("CPU: 1%\rMEM: 2%\r");
        assert_eq!(pairs(&rows), vec![("CPU", "1%"), ("MEM", "2%")]);
    }

    #[test]
    fn test_parse_keeps_empty_keys_and_values() {
        let rows = parse(": orphan\nkey:\n");
        assert_eq!(pairs(&rows), vec![("", "orphan"), ("key", "")]);
    }

    #[test]
    fn test_extract_from_file_with_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Usage: 10%\nDisk\xfe: 3 GB\n").unwrap();

        let extraction = extract(file.path()).unwrap();
        assert_eq!(pairs(extraction.rows()), vec![("Usage", "10%"), ("Disk", "3 GB")]);
    }
}
