/// Turns a display name into an identifier usable as a node or schema name.
///
/// Every character that is not alphanumeric or `_` becomes `_`, and a leading
/// digit gets a `_` prefix.
pub fn sanitize_identifier(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}
