//! Console prompts.

use std::io::{BufRead, Write};

/// Print `msg` to `output` and read one trimmed line from `input`.
pub fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    msg: &str,
) -> std::io::Result<String> {
    write!(output, "{}", msg)?;
    output.flush()?;

    let mut buf = String::new();
    input.read_line(&mut buf)?;
    Ok(buf.trim().to_string())
}
