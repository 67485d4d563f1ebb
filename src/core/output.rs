//! Compact output rendering helpers for CLI surfaces.

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Keep the first `max_chars` characters verbatim, marking a cut with `...`.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &input[..cut]),
        None => input.to_string(),
    }
}

/// Render a percentage with one decimal place, or `N/A` when the
/// denominator is zero.
pub fn percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        return "N/A".to_string();
    }
    format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
}
