//! Command-line assembly for the engine.
//!
//! The command is a single string in ffmpeg's argument dialect. The job
//! runner only assembles it; tokenising happens at the process boundary.

use std::path::Path;

/// Assembles the full engine command for one file.
///
/// Layout: global flags, input reference, planned parameters, output reference.
pub fn build_command(
    global_args: &[String],
    input: &Path,
    params: &str,
    output: &Path,
) -> String {
    let mut parts: Vec<String> = vec!["-y".to_string(), "-hide_banner".to_string()];
    parts.extend(global_args.iter().cloned());
    parts.push("-i".to_string());
    parts.push(quote(&input.to_string_lossy()));
    if !params.trim().is_empty() {
        parts.push(params.trim().to_string());
    }
    parts.push(quote(&output.to_string_lossy()));
    parts.join(" ")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Splits a command string into arguments.
///
/// Whitespace separates arguments; single and double quotes group, and a
/// backslash escapes the next character outside single quotes.
pub(crate) fn split_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => current.push(c),
            (Some('"'), '"') => quote = None,
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_arg = true;
            }
            (Some(_), _) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_arg = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, _) => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if in_arg {
        args.push(current);
    }
    args
}
