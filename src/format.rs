//! Formatting helpers for sizes, durations, paths and outcome messages.

use std::time::Duration;

use crate::session::SourceOfTermination;

/// Formats a byte count as a human-readable string (B, KB, MB, GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a duration as e.g. "5.0s", "1m 05s", "1h 01m 05s".
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        3600.. => format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60),
        60.. => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}.{:01}s", secs, d.subsec_millis() / 100),
    }
}

/// Turns a comic or chapter title into a single directory name.
///
/// Spaces and path separators become hyphens. A name made only of dots
/// becomes hyphens too, so it never refers to `.` or `..`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    let name = input
        .chars()
        .map(|c| if matches!(c, ' ' | '/' | '\\') { '-' } else { c })
        .collect::<String>()
        .to_lowercase();
    if !name.is_empty() && name.chars().all(|c| c == '.') {
        return "-".repeat(name.len());
    }
    name
}

/// Severity of a session outcome message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// The line shown when a session ends.
#[must_use]
pub fn outcome_message(source: SourceOfTermination, failed: usize) -> (OutcomeLevel, String) {
    match (source, failed) {
        (SourceOfTermination::User, _) => {
            (OutcomeLevel::Info, "Application exited by user.".to_string())
        }
        (SourceOfTermination::Error, _) => (
            OutcomeLevel::Error,
            "The application encountered an error. Check the log file for more info.".to_string(),
        ),
        (SourceOfTermination::Program, 0) => (
            OutcomeLevel::Success,
            "Download completed. No errors have been tracked.".to_string(),
        ),
        (SourceOfTermination::Program, 1) => (
            OutcomeLevel::Warn,
            "1 download failed. Check the log file for more info.".to_string(),
        ),
        (SourceOfTermination::Program, n) => (
            OutcomeLevel::Warn,
            format!("{n} downloads failed. Check the log file for more info."),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(Duration::from_millis(500)), "0.5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 01m 05s");
    }

    #[test]
    fn sanitize_lowercases_and_hyphenates() {
        assert_eq!(sanitize("Solo Leveling"), "solo-leveling");
        assert_eq!(sanitize("Chapter 12 Part 2"), "chapter-12-part-2");
        assert_eq!(sanitize("already-clean"), "already-clean");
    }

    #[test]
    fn sanitize_keeps_titles_to_one_component() {
        assert_eq!(sanitize("Vol.1/Ch.2"), "vol.1-ch.2");
        assert_eq!(sanitize("Part 1\\2"), "part-1-2");
        assert_eq!(sanitize(".."), "--");
        assert_eq!(sanitize("."), "-");
        assert_eq!(sanitize("../../etc"), "..-..-etc");
        assert_eq!(sanitize("Ch. 1..."), "ch.-1...");
    }

    #[test]
    fn outcome_messages() {
        let cases = [
            (SourceOfTermination::User, 0, OutcomeLevel::Info, "Application exited by user."),
            (
                SourceOfTermination::Error,
                0,
                OutcomeLevel::Error,
                "The application encountered an error. Check the log file for more info.",
            ),
            (
                SourceOfTermination::Program,
                0,
                OutcomeLevel::Success,
                "Download completed. No errors have been tracked.",
            ),
            (
                SourceOfTermination::Program,
                1,
                OutcomeLevel::Warn,
                "1 download failed. Check the log file for more info.",
            ),
            (
                SourceOfTermination::Program,
                2,
                OutcomeLevel::Warn,
                "2 downloads failed. Check the log file for more info.",
            ),
        ];
        for (source, failed, level, message) in cases {
            assert_eq!(outcome_message(source, failed), (level, message.to_string()));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitize_has_no_spaces_or_uppercase(input in "[A-Za-z0-9 ]{0,40}") {
                let out = sanitize(&input);
                prop_assert!(!out.contains(' '));
                prop_assert_eq!(out.to_lowercase(), out.clone());
                prop_assert_eq!(out.len(), input.len());
            }

            #[test]
            fn sanitize_yields_one_path_component(input in "[A-Za-z ./\\\\]{1,20}") {
                let out = sanitize(&input);
                let components: Vec<_> = std::path::Path::new(&out).components().collect();
                prop_assert_eq!(components.len(), 1);
                prop_assert!(matches!(components[0], std::path::Component::Normal(_)));
            }
        }
    }
}
