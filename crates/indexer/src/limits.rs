use std::time::Duration;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_DIRECTORY_REMOVAL_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_COMMIT_THRESHOLD: u64 = 100;
pub const DEFAULT_COMMIT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_POLL_INTERVAL: Duration = Duration::from_millis(500);

const MAX_DELAY_MS: u64 = 60_000;
const MAX_COMMIT_THRESHOLD: u64 = 1_000_000;

/// Timing knobs of the live pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintainerConfig {
    /// Time from the first filesystem event of a batch until it runs.
    pub settle_delay: Duration,
    /// How long a directory removal waits for the directory to reappear.
    pub directory_removal_delay: Duration,
    /// Pending changes that force a flush regardless of the save interval.
    pub commit_threshold: u64,
    pub commit_poll_interval: Duration,
    pub retry_poll_interval: Duration,
    /// Minimum time between two attempts at the same failed change.
    pub retry_spacing: Duration,
    pub batch_size: usize,
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            directory_removal_delay: DEFAULT_DIRECTORY_REMOVAL_DELAY,
            commit_threshold: DEFAULT_COMMIT_THRESHOLD,
            commit_poll_interval: DEFAULT_COMMIT_POLL_INTERVAL,
            retry_poll_interval: DEFAULT_RETRY_POLL_INTERVAL,
            retry_spacing: crate::retry::MIN_RETRY_SPACING,
            batch_size: crate::builder::BATCH_SIZE,
        }
    }
}

impl MaintainerConfig {
    /// Defaults overridden by `CODESEARCH_SETTLE_DELAY_MS`,
    /// `CODESEARCH_DIR_REMOVAL_DELAY_MS` and `CODESEARCH_COMMIT_THRESHOLD`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env = |name: &str| std::env::var(name).ok();
        Self {
            settle_delay: parse_delay_ms(
                env("CODESEARCH_SETTLE_DELAY_MS").as_deref(),
                defaults.settle_delay,
            ),
            directory_removal_delay: parse_delay_ms(
                env("CODESEARCH_DIR_REMOVAL_DELAY_MS").as_deref(),
                defaults.directory_removal_delay,
            ),
            commit_threshold: parse_bounded(
                env("CODESEARCH_COMMIT_THRESHOLD").as_deref(),
                defaults.commit_threshold,
                1,
                MAX_COMMIT_THRESHOLD,
            ),
            ..defaults
        }
    }
}

pub fn parse_bounded(raw: Option<&str>, default_value: u64, min: u64, max: u64) -> u64 {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_value)
        .clamp(min, max)
}

fn parse_delay_ms(raw: Option<&str>, default_value: Duration) -> Duration {
    let default_ms = u64::try_from(default_value.as_millis()).unwrap_or(MAX_DELAY_MS);
    Duration::from_millis(parse_bounded(raw, default_ms, 0, MAX_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_bounded_falls_back_and_clamps() {
        assert_eq!(parse_bounded(None, 100, 1, 10_000), 100);
        assert_eq!(parse_bounded(Some(" "), 100, 1, 10_000), 100);
        assert_eq!(parse_bounded(Some("abc"), 100, 1, 10_000), 100);
        assert_eq!(parse_bounded(Some("0"), 100, 1, 10_000), 1);
        assert_eq!(parse_bounded(Some("99999"), 100, 1, 10_000), 10_000);
        assert_eq!(parse_bounded(Some(" 250 "), 100, 1, 10_000), 250);
    }

    #[test]
    fn delays_parse_as_milliseconds() {
        assert_eq!(
            parse_delay_ms(Some("250"), DEFAULT_SETTLE_DELAY),
            Duration::from_millis(250)
        );
        assert_eq!(
            parse_delay_ms(None, DEFAULT_DIRECTORY_REMOVAL_DELAY),
            Duration::from_secs(2)
        );
    }
}
