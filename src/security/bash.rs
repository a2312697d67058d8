//! Shell command guard.

use once_cell::sync::Lazy;
use regex::Regex;

use super::Decision;

/// Commands that are never allowed.
static BLOCKED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"rm\s+-rf\s+/", "Cannot delete root filesystem"),
        (r"rm\s+-rf\s+~", "Cannot delete home directory"),
        (r"sudo\s+rm", "Cannot use sudo rm"),
        (r"chmod\s+777", "Cannot set world-writable permissions"),
        (r">\s*/etc/", "Cannot overwrite system files"),
        (r"curl.*\|\s*sh", "Cannot pipe curl to shell"),
        (r"wget.*\|\s*sh", "Cannot pipe wget to shell"),
        (r":\(\)\s*\{.*\};\s*:", "Fork bomb detected"),
    ])
});

/// Commands that need confirmation first.
static CONFIRM: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"rm\s+-rf", "Recursive force delete"),
        (r"DROP\s+DATABASE", "Database drop operation"),
        (r"DROP\s+TABLE", "Table drop operation"),
        (r"TRUNCATE", "Table truncate operation"),
    ])
});

fn compile(patterns: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .filter_map(|(pattern, message)| match Regex::new(&format!("(?i){pattern}")) {
            Ok(re) => Some((re, *message)),
            Err(e) => {
                tracing::error!(pattern, error = %e, "Invalid guard pattern");
                None
            }
        })
        .collect()
}

/// Check a shell command. Matching is case-insensitive.
pub fn check_command(command: &str) -> Decision {
    if let Some((_, message)) = BLOCKED.iter().find(|(re, _)| re.is_match(command)) {
        return Decision::Block(format!("BLOCKED: {message}"));
    }
    if let Some((_, message)) = CONFIRM.iter().find(|(re, _)| re.is_match(command)) {
        return Decision::Ask(format!("Warning: {message}"));
    }
    Decision::Allow
}
