//! JSON I/O handling for CLI
//!
//! - Input: one JSON document on stdin
//! - Output: one JSON object per command on stdout

use std::io::{Read, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read one JSON document from `input`
pub fn read_request<R: Read>(input: &mut R) -> CliResult<Value> {
    let mut body = String::new();
    input.read_to_string(&mut body)?;

    if body.trim().is_empty() {
        return Err(CliError::bad_request("Empty input"));
    }

    Ok(serde_json::from_str(&body)?)
}

/// Write a success response
pub fn write_response<W: Write>(out: &mut W, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}

/// Write an error response
pub fn write_error<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}
