//! Line-oriented JSON I/O
//!
//! Requests arrive on stdin, one JSON object per line. Responses go to
//! stdout, one per line. Logs go to stderr and never mix with responses.

use std::io::{self, BufRead, Read, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Reads one request from stdin
pub fn read_request() -> CliResult<String> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyInput);
    }
    Ok(trimmed.to_string())
}

/// Non-empty request lines from stdin until EOF
pub fn read_lines() -> impl Iterator<Item = CliResult<String>> {
    io::stdin().lock().lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Ok(line)),
        Err(e) => Some(Err(CliError::from(e))),
    })
}

/// Writes `{"status":"ok","data":...}`
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&serde_json::json!({ "status": "ok", "data": data }).to_string())
}

/// Writes one line to stdout and flushes
pub fn write_json(json: &str) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}
