use chrono::NaiveDate;

/// Parse the content of a watermark file
///
/// Surrounding whitespace (a trailing newline from a hand edit) is ignored.
pub fn parse_watermark(content: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(content.trim(), "%Y-%m-%d").ok()
}

/// Render a watermark the way it is stored: bare `YYYY-MM-DD`
pub fn format_watermark(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
