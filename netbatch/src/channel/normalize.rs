//! Output and command-name normalization.

/// Turn a command into a stable key usable as a map key or file name fragment.
///
/// Lower-cases, trims surrounding whitespace, then replaces spaces and dashes
/// with underscores.
pub fn command_key(command: &str) -> String {
    command.trim().to_lowercase().replace(['-', ' '], "_")
}

/// Strip the echoed command (first line) and the prompt line (last line).
///
/// Lines are split on `\r\n`. Input with a single line or less is returned
/// unchanged since there is nothing to strip.
pub fn truncate_output(raw: &str) -> String {
    let lines: Vec<&str> = raw.split("\r\n").collect();
    if lines.len() <= 1 {
        return raw.to_string();
    }
    lines[1..lines.len() - 1].join("\r\n")
}
