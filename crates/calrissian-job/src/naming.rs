//! Kubernetes object names for jobs.

use chrono::Utc;
use uuid::Uuid;

/// Longest name a DNS-1123 label allows.
pub const MAX_NAME_LEN: usize = 63;

/// A fresh job name: `job-<secs><micros>-<uuid>`, shortened to fit.
pub fn generate_job_name() -> String {
    let now = Utc::now();
    let name = format!(
        "job-{}{:06}-{}",
        now.timestamp(),
        now.timestamp_subsec_micros(),
        Uuid::new_v4()
    );
    shorten_name(&name)
}

/// Trim a name to [`MAX_NAME_LEN`] characters without a trailing `-`.
///
/// Names that already fit are returned unchanged.
pub fn shorten_name(name: &str) -> String {
    let mut chars: Vec<char> = name.chars().collect();
    while chars.len() > MAX_NAME_LEN {
        chars.pop();
        while chars.last() == Some(&'-') {
            chars.pop();
        }
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_fit() {
        for _ in 0..50 {
            let name = generate_job_name();
            assert!(name.starts_with("job-"));
            assert!(name.len() <= MAX_NAME_LEN);
            assert!(!name.ends_with('-'));
        }
    }

    #[test]
    fn test_generated_names_are_unique() {
        assert_ne!(generate_job_name(), generate_job_name());
    }

    #[test]
    fn test_shorten_strips_trailing_dashes() {
        let name = format!("{}--tail", "a".repeat(62));
        let short = shorten_name(&name);
        assert_eq!(short, "a".repeat(62));
    }

    #[test]
    fn test_short_names_untouched() {
        assert_eq!(shorten_name("job-1-"), "job-1-");
        assert_eq!(shorten_name(&"b".repeat(63)), "b".repeat(63));
        assert_eq!(shorten_name(&"b".repeat(70)).len(), 63);
    }

    #[test]
    fn test_shorten_counts_characters() {
        let fits = "é".repeat(MAX_NAME_LEN);
        assert_eq!(shorten_name(&fits), fits);

        let long = format!("{}-ü", "é".repeat(MAX_NAME_LEN));
        let short = shorten_name(&long);
        assert_eq!(short.chars().count(), MAX_NAME_LEN);
        assert_eq!(short, fits);
    }
}
