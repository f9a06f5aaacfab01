/// Trim whitespace, a leading byte-order mark, and outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Media type for a file name, judged by extension only.
pub fn media_type_for(file_name: &str) -> &'static str {
    if file_name.to_lowercase().ends_with(".csv") {
        "text/csv"
    } else {
        "application/octet-stream"
    }
}

/// `true` for `text/csv`, ignoring case and any `; charset=...` parameters.
pub fn is_csv_media_type(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case("text/csv"))
        .unwrap_or(false)
}
