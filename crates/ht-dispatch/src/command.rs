//! Splitting a flat token stream into per-job command lines.

/// Tokens with this suffix mark the start of a new job by convention:
/// training entry points are scripts.
pub const DEFAULT_JOB_MARKER_SUFFIX: &str = ".py";

/// Split `tokens` into commands at every token ending with `marker_suffix`.
///
/// A marker token starts a new command; the tokens that follow it, up to the
/// next marker, are its arguments. Leading tokens before the first marker
/// form a command of their own, so a marker-less invocation still yields one
/// job.
pub fn split_commands(tokens: &[String], marker_suffix: &str) -> Vec<Vec<String>> {
    let mut commands: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for token in tokens {
        if token.ends_with(marker_suffix) {
            if !current.is_empty() {
                commands.push(current);
            }
            current = vec![token.clone()];
        } else {
            current.push(token.clone());
        }
    }
    if !current.is_empty() {
        commands.push(current);
    }

    commands
}
