//! JSON output for CLI commands
//!
//! Every command prints exactly one JSON object on its own line to
//! stdout. Log lines may precede it.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write `value` as one JSON line to stdout
pub fn write_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_json_to(&mut out, value)?;
    out.flush()?;
    Ok(())
}

/// Write `value` as one JSON line to `writer`
pub fn write_json_to<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}
