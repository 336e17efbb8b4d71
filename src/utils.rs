//! Utility functions

use std::time::Duration;

/// Replace characters that are invalid in filenames with underscores
///
/// Trailing dots and spaces are stripped as well, since Windows refuses
/// filenames ending in either.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string()
}

/// Format a byte count as a human-readable size
pub fn format_size(size: Option<u64>) -> String {
    let Some(size) = size else {
        return "unknown size".to_string();
    };
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}TB")
}

/// Format a duration as `MM:SS`, or `H:MM:SS` for durations of an hour or more
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
    }

    #[test]
    fn sanitize_keeps_ordinary_names() {
        assert_eq!(sanitize_filename("Episode 12 - The Return"), "Episode 12 - The Return");
    }

    #[test]
    fn sanitize_strips_trailing_dots_and_spaces() {
        assert_eq!(sanitize_filename("episode... "), "episode");
    }

    #[test]
    fn format_size_handles_unknown() {
        assert_eq!(format_size(None), "unknown size");
    }

    #[test]
    fn format_size_picks_sensible_units() {
        assert_eq!(format_size(Some(512)), "512.0B");
        assert_eq!(format_size(Some(2048)), "2.0KB");
        assert_eq!(format_size(Some(5 * 1024 * 1024)), "5.0MB");
    }

    #[test]
    fn format_duration_under_an_hour() {
        assert_eq!(format_duration(Duration::from_secs(125)), "02:05");
    }

    #[test]
    fn format_duration_with_hours() {
        assert_eq!(format_duration(Duration::from_secs(3600 + 62)), "1:01:02");
    }
}
