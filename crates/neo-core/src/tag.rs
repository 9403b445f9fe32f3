//! Run tags namespacing each conversion's temporary output

use std::sync::atomic::{AtomicU64, Ordering};

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Prefix shared by every run tag
pub const RUN_TAG_PREFIX: &str = "USER_";

/// Generate a run tag: `USER_<local timestamp ms>_<pid>_<counter>`
///
/// Unique within a process through the counter and across processes through
/// the pid and timestamp.
pub fn next_run_tag() -> String {
    let n = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}{}_{}_{}",
        RUN_TAG_PREFIX,
        chrono::Local::now().format("%Y%m%d%H%M%S%3f"),
        std::process::id(),
        n
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| next_run_tag()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for tag in handle.join().unwrap() {
                assert!(seen.insert(tag), "duplicate run tag");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_tag_shape() {
        let tag = next_run_tag();
        assert!(tag.starts_with(RUN_TAG_PREFIX));
        assert!(tag
            .trim_start_matches(RUN_TAG_PREFIX)
            .chars()
            .all(|c| c.is_ascii_digit() || c == '_'));
    }
}
