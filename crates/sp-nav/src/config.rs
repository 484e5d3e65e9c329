//! Navigator configuration and environment overrides.

use sp_core::SpliceError;
use sp_core::SpliceResult;
use std::time::Duration;

pub const DEFAULT_CONTENT_REGION: &str = "pjax-container";
pub const DEFAULT_SECONDARY_REGION: &str = "site-nav";
pub const DEFAULT_BUSY_CLASS: &str = "pjax-loading";
pub const DEFAULT_LOADING_DELAY: Duration = Duration::from_millis(300);
const MAX_LOADING_DELAY: Duration = Duration::from_secs(60);

/// How completions of overlapping navigations are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Every completion is applied in arrival order, even when a later navigation started.
    #[default]
    Tolerate,
    /// Only the most recently started navigation may patch; older ones resolve as superseded.
    LatestWins,
}

impl OverlapPolicy {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "tolerate" => Some(Self::Tolerate),
            "latest-wins" | "latest_wins" | "latest" => Some(Self::LatestWins),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigatorConfig {
    /// Id of the region whose presence is required for a patch.
    pub content_region: String,
    /// Regions patched when present in both documents.
    pub secondary_regions: Vec<String>,
    pub busy_class: String,
    pub loading_delay: Duration,
    /// Same-origin paths that always take a full navigation.
    pub hard_paths: Vec<String>,
    pub overlap: OverlapPolicy,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            content_region: DEFAULT_CONTENT_REGION.to_owned(),
            secondary_regions: vec![DEFAULT_SECONDARY_REGION.to_owned()],
            busy_class: DEFAULT_BUSY_CLASS.to_owned(),
            loading_delay: DEFAULT_LOADING_DELAY,
            hard_paths: vec!["/logout".to_owned()],
            overlap: OverlapPolicy::Tolerate,
        }
    }
}

impl NavigatorConfig {
    /// Defaults overridden by `SPLICE_*` environment variables.
    pub fn from_env() -> SpliceResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SpliceResult<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("SPLICE_CONTENT_REGION") {
            config.content_region = value.trim().to_owned();
        }
        if let Some(value) = lookup("SPLICE_SECONDARY_REGIONS") {
            config.secondary_regions = split_list(&value);
        }
        if let Some(value) = lookup("SPLICE_BUSY_CLASS") {
            config.busy_class = value.trim().to_owned();
        }
        if let Some(value) = lookup("SPLICE_LOADING_DELAY_MS") {
            let millis = value.trim().parse::<u64>().map_err(|error| {
                SpliceError::new(
                    "nav.config.invalid_delay",
                    format!("SPLICE_LOADING_DELAY_MS `{value}` is not a number: {error}"),
                )
            })?;
            config.loading_delay = Duration::from_millis(millis);
        }
        if let Some(value) = lookup("SPLICE_HARD_PATHS") {
            config.hard_paths = split_list(&value);
        }
        if let Some(value) = lookup("SPLICE_OVERLAP") {
            config.overlap = OverlapPolicy::from_token(&value).ok_or_else(|| {
                SpliceError::new(
                    "nav.config.invalid_overlap",
                    format!("SPLICE_OVERLAP must be `tolerate` or `latest-wins`, got `{value}`"),
                )
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SpliceResult<()> {
        if !is_token(&self.content_region) {
            return Err(SpliceError::new(
                "nav.config.invalid_region",
                format!("content region id `{}` must be a non-empty token", self.content_region),
            ));
        }

        for region in &self.secondary_regions {
            if !is_token(region) {
                return Err(SpliceError::new(
                    "nav.config.invalid_region",
                    format!("secondary region id `{region}` must be a non-empty token"),
                ));
            }
            if *region == self.content_region {
                return Err(SpliceError::new(
                    "nav.config.duplicate_region",
                    format!("region `{region}` is configured as both content and secondary"),
                ));
            }
        }

        if !is_token(&self.busy_class) {
            return Err(SpliceError::new(
                "nav.config.invalid_busy_class",
                format!("busy class `{}` must be a single class name", self.busy_class),
            ));
        }

        if self.loading_delay.is_zero() || self.loading_delay > MAX_LOADING_DELAY {
            return Err(SpliceError::new(
                "nav.config.invalid_delay",
                format!(
                    "loading delay must be between 1ms and {}s, got {:?}",
                    MAX_LOADING_DELAY.as_secs(),
                    self.loading_delay
                ),
            ));
        }

        if let Some(path) = self.hard_paths.iter().find(|path| !path.starts_with('/')) {
            return Err(SpliceError::new(
                "nav.config.invalid_hard_path",
                format!("hard-navigation path `{path}` must start with `/`"),
            ));
        }
        if let Some(path) = self
            .hard_paths
            .iter()
            .find(|path| path.trim_end_matches('/').is_empty())
        {
            return Err(SpliceError::new(
                "nav.config.invalid_hard_path",
                format!("hard-navigation path `{path}` would match every page"),
            ));
        }

        Ok(())
    }

    /// Content region first, then secondary regions.
    pub fn regions(&self) -> Vec<&str> {
        std::iter::once(self.content_region.as_str())
            .chain(self.secondary_regions.iter().map(String::as_str))
            .collect()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn is_token(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::NavigatorConfig;
    use super::OverlapPolicy;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = NavigatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.regions(), vec!["pjax-container", "site-nav"]);
        assert_eq!(config.loading_delay, Duration::from_millis(300));
        assert_eq!(config.overlap, OverlapPolicy::Tolerate);
    }

    #[test]
    fn environment_overrides_apply() {
        let config = NavigatorConfig::from_lookup(lookup_from(&[
            ("SPLICE_CONTENT_REGION", "main"),
            ("SPLICE_SECONDARY_REGIONS", "nav, flash ,"),
            ("SPLICE_LOADING_DELAY_MS", "150"),
            ("SPLICE_HARD_PATHS", "/logout,/admin"),
            ("SPLICE_OVERLAP", "latest-wins"),
        ]));
        let config = match config {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(config.content_region, "main");
        assert_eq!(config.secondary_regions, vec!["nav", "flash"]);
        assert_eq!(config.loading_delay, Duration::from_millis(150));
        assert_eq!(config.hard_paths, vec!["/logout", "/admin"]);
        assert_eq!(config.overlap, OverlapPolicy::LatestWins);
    }

    #[test]
    fn rejects_bad_overrides() {
        let delay = NavigatorConfig::from_lookup(lookup_from(&[("SPLICE_LOADING_DELAY_MS", "soon")]));
        assert_eq!(delay.map_err(|error| error.code), Err("nav.config.invalid_delay"));

        let zero = NavigatorConfig::from_lookup(lookup_from(&[("SPLICE_LOADING_DELAY_MS", "0")]));
        assert_eq!(zero.map_err(|error| error.code), Err("nav.config.invalid_delay"));

        let overlap = NavigatorConfig::from_lookup(lookup_from(&[("SPLICE_OVERLAP", "queue")]));
        assert_eq!(overlap.map_err(|error| error.code), Err("nav.config.invalid_overlap"));
    }

    #[test]
    fn validation_catches_region_conflicts() {
        let config = NavigatorConfig {
            secondary_regions: vec!["pjax-container".to_owned()],
            ..NavigatorConfig::default()
        };
        assert_eq!(config.validate().map_err(|error| error.code), Err("nav.config.duplicate_region"));

        let config = NavigatorConfig {
            busy_class: "is loading".to_owned(),
            ..NavigatorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = NavigatorConfig {
            hard_paths: vec!["logout".to_owned()],
            ..NavigatorConfig::default()
        };
        assert_eq!(config.validate().map_err(|error| error.code), Err("nav.config.invalid_hard_path"));
    }

    #[test]
    fn root_hard_paths_are_rejected() {
        for path in ["/", "//", ""] {
            let config = NavigatorConfig {
                hard_paths: vec!["/logout".to_owned(), path.to_owned()],
                ..NavigatorConfig::default()
            };
            assert_eq!(
                config.validate().map_err(|error| error.code),
                Err("nav.config.invalid_hard_path"),
                "{path:?}"
            );
        }
    }
}
