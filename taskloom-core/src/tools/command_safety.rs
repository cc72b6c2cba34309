//! Detection of commands that are destructive regardless of options.
//!
//! Matching commands still run when the user approves them; the flag only
//! forces the approval through the interactive gate, bypassing unattended
//! auto-approval.

/// True when any segment of a (possibly chained) shell command matches the
/// destructive set: recursive/forced deletion, git history or remote
/// mutation, raw device writes, and privilege-escalated variants thereof.
pub(crate) fn command_is_destructive(command: &str) -> bool {
    split_segments(command).any(|segment| segment_is_destructive(&segment))
}

/// Split on shell chain operators so `build && rm -rf out` is inspected
/// per segment. Quoting is not honored; a quoted `&&` splits too, which
/// errs toward prompting.
fn split_segments(command: &str) -> impl Iterator<Item = Vec<String>> + '_ {
    command
        .split(['\n', ';'])
        .flat_map(|part| part.split("&&"))
        .flat_map(|part| part.split("||"))
        .flat_map(|part| part.split('|'))
        .map(|segment| {
            segment
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|tokens| !tokens.is_empty())
}

fn segment_is_destructive(tokens: &[String]) -> bool {
    let Some(first) = tokens.first() else {
        return false;
    };
    let base = base_name(first);

    match base {
        "sudo" | "doas" => segment_is_destructive(&tokens[1..]),
        "rm" => tokens[1..].iter().any(|arg| {
            arg.starts_with('-') && (arg.contains('r') || arg.contains('f'))
        }),
        "git" => matches!(
            tokens.get(1).map(String::as_str),
            Some("push" | "reset" | "clean" | "rm")
        ),
        "mkfs" | "dd" | "shutdown" | "reboot" | "halt" => true,
        "truncate" => tokens.iter().any(|arg| arg == "-s"),
        "chmod" | "chown" => tokens.iter().any(|arg| arg == "-R" || arg == "--recursive"),
        _ => base.starts_with("mkfs."),
    }
}

fn base_name(token: &str) -> &str {
    std::path::Path::new(token)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(token)
}
