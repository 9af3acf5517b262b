// campaign-cli/src/output.rs
// ============================================================================
// Module: CLI Output Helpers
// Description: The only two places this crate is allowed to touch stdio.
// Purpose: Keep `print!`/`eprintln!` out of the codebase entirely.
// Dependencies: std::io
// ============================================================================

use std::io::Write as _;

/// Writes a single line to standard output.
pub fn write_stdout_line(message: &str) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(&mut stdout, "{message}");
}

/// Writes a single line to standard error.
pub fn write_stderr_line(message: &str) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
}
