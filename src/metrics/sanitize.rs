//! Metric path segment normalization.

/// Builds a metric path from raw labels.
///
/// Null labels are dropped without leaving a gap. Whitespace and `.` in the
/// remaining labels become `_`. Order and duplicates are preserved.
pub fn sanitize_labels<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    labels.into_iter().flatten().map(sanitize_segment).collect()
}

/// Replaces whitespace and `.` with `_`.
pub fn sanitize_segment(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_whitespace() || c == '.' { '_' } else { c })
        .collect()
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
///
/// Used for PgBouncer metrics, whose labels are client-controlled.
pub fn sanitize_segment_strict(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
