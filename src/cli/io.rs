//! stdout output for the CLI
//!
//! Reports go out as a single JSON object on one line. Log events share
//! stdout, so the report is always the last line a run writes there.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write `value` as one JSON line to stdout
pub fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    write_json_to(value, &mut stdout)
}

/// Write `value` as one JSON line to `writer`
pub fn write_json_to<T: Serialize, W: Write>(value: &T, writer: &mut W) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
