//! Name normalization helpers shared by schema compilation.

/// Collapse fully uppercase runs so only the first letter stays uppercase.
///
/// Taxonomy labels occasionally contain acronym runs (`NOx`, `EPAId`) that
/// would otherwise sprout an underscore between every letter when converted
/// to snake case.
pub fn lowercase_uppercase_runs(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (idx, ch) in chars.iter().enumerate() {
        let prev_upper = idx > 0 && chars[idx - 1].is_ascii_uppercase();
        if ch.is_ascii_uppercase() && prev_upper {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(*ch);
        }
    }
    out
}

/// Convert a concept or role name to ASCII snake_case.
///
/// Non-alphanumeric characters become underscores, uppercase letters start a
/// new segment, and underscore runs collapse to one.
pub fn to_snake_case(name: &str) -> String {
    let normalized = lowercase_uppercase_runs(name);
    let mut out = String::with_capacity(normalized.len() + 8);
    let mut last_was_underscore = true;
    for ch in normalized.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && !last_was_underscore {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Collapse whitespace runs in a label or documentation string and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}
