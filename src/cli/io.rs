//! JSON line I/O for the CLI
//!
//! - Input: one JSON object per line on stdin
//! - Output: one JSON object per line on stdout
//! - UTF-8 only

use std::io::{self, BufRead, Write};

use serde::Deserialize;
use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::queue::JobName;

/// One job request read from stdin
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_name: JobName,
    pub data: Value,
}

/// Parse one input line
pub fn parse_request(line: &str) -> CliResult<JobRequest> {
    if line.trim().is_empty() {
        return Err(CliError::io_error("Empty line"));
    }
    serde_json::from_str(line).map_err(|e| CliError::request_rejected(e.to_string()))
}

/// Job requests from stdin until EOF
pub fn read_requests() -> impl Iterator<Item = CliResult<JobRequest>> {
    let stdin = io::stdin();
    stdin.lock().lines().map(|line| {
        let line = line.map_err(CliError::from)?;
        parse_request(&line)
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_json(&serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

/// Write a JSON value on its own line
pub fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
