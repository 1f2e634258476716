//! JSON I/O handling for CLI
//!
//! - Input: JSON documents read from files
//! - Output: single JSON object via stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read and parse a JSON document from `path`
pub fn read_document<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::io_error(format!("Invalid JSON in {}: {}", path.display(), e)))
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_value(&response)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_value(&response)
}

fn write_value(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineDoc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_document() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": 1, "filters": []}}"#).unwrap();
        let doc: PipelineDoc = read_document(file.path()).unwrap();
        assert!(doc.filters.is_empty());
    }

    #[test]
    fn test_read_missing_document() {
        let err = read_document::<PipelineDoc>(Path::new("/nonexistent/p.json")).unwrap_err();
        assert_eq!(err.code_str(), "KVPIPE_CLI_IO_ERROR");
    }
}
