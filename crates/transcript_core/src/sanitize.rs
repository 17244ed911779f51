/// Longest identifier `sanitize_title` will produce.
pub const MAX_SAFE_NAME_LEN: usize = 80;

/// Filesystem-safe identifier for a media title.
///
/// The title is trimmed, every run of characters outside `[A-Za-z0-9_]`
/// collapses to a single `_`, and the result is cut to
/// [`MAX_SAFE_NAME_LEN`] characters. Applying it twice yields the same name.
pub fn sanitize_title(title: &str) -> String {
    let mut safe = String::with_capacity(title.len().min(MAX_SAFE_NAME_LEN * 4));
    let mut in_run = false;
    for c in title.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            safe.push(c);
            in_run = false;
        } else if !in_run {
            safe.push('_');
            in_run = true;
        }
    }
    // Only ASCII survives, so byte truncation is char-safe.
    safe.truncate(MAX_SAFE_NAME_LEN);
    safe
}
