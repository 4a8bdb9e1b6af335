//! Trial configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::experiment::ParamMap;
use crate::reporter::MetricSink;
use crate::sync::Remote;

/// Environment variable overriding the default log root.
pub const LOG_DIR_ENV: &str = "TRACK_LOG_DIR";

/// Log root used when none is configured: `$TRACK_LOG_DIR`, else `<tmp>/track`.
#[must_use]
pub fn default_log_dir() -> PathBuf {
    std::env::var_os(LOG_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| std::env::temp_dir().join("track"), PathBuf::from)
}

/// Everything needed to construct a [`crate::Trial`].
pub struct TrialConfig {
    pub(crate) log_dir: PathBuf,
    pub(crate) upload_dir: Option<PathBuf>,
    pub(crate) remote: Option<Box<dyn Remote>>,
    pub(crate) sync_period: Option<Duration>,
    pub(crate) trial_prefix: String,
    pub(crate) param_map: ParamMap,
    pub(crate) init_logging: bool,
    pub(crate) reporter: Option<Box<dyn MetricSink>>,
}

impl TrialConfig {
    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> TrialConfigBuilder {
        TrialConfigBuilder::default()
    }

    /// Local log root.
    #[must_use]
    pub const fn log_dir(&self) -> &PathBuf {
        &self.log_dir
    }

    /// Trial name prefix.
    #[must_use]
    pub fn trial_prefix(&self) -> &str {
        &self.trial_prefix
    }

    /// Sync period, `None` when syncing is disabled (unset or zero).
    #[must_use]
    pub fn sync_period(&self) -> Option<Duration> {
        self.sync_period.filter(|p| !p.is_zero())
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for TrialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialConfig")
            .field("log_dir", &self.log_dir)
            .field("upload_dir", &self.upload_dir)
            .field("remote", &self.remote.as_ref().map(|r| r.describe()))
            .field("sync_period", &self.sync_period)
            .field("trial_prefix", &self.trial_prefix)
            .field("param_map", &self.param_map)
            .field("init_logging", &self.init_logging)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

/// Builder for `TrialConfig`.
pub struct TrialConfigBuilder {
    log_dir: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
    remote: Option<Box<dyn Remote>>,
    sync_period: Option<Duration>,
    trial_prefix: String,
    param_map: ParamMap,
    init_logging: bool,
    reporter: Option<Box<dyn MetricSink>>,
}

impl Default for TrialConfigBuilder {
    fn default() -> Self {
        Self {
            log_dir: None,
            upload_dir: None,
            remote: None,
            sync_period: None,
            trial_prefix: String::new(),
            param_map: ParamMap::new(),
            init_logging: true,
            reporter: None,
        }
    }
}

impl TrialConfigBuilder {
    /// Set the local log root.
    #[must_use]
    pub fn log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    /// Mirror the trial to `<upload_dir>/<trial_id>/` (needs a sync period).
    #[must_use]
    pub fn upload_dir(mut self, upload_dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(upload_dir.into());
        self
    }

    /// Mirror to a custom remote instead of `upload_dir` (needs a sync period).
    #[must_use]
    pub fn remote(mut self, remote: impl Remote + 'static) -> Self {
        self.remote = Some(Box::new(remote));
        self
    }

    /// Sync every `period`; zero disables syncing.
    #[must_use]
    pub const fn sync_period(mut self, period: Duration) -> Self {
        self.sync_period = Some(period);
        self
    }

    /// Prefix of the trial directory name.
    #[must_use]
    pub fn trial_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.trial_prefix = prefix.into();
        self
    }

    /// Parameters persisted once at start.
    #[must_use]
    pub fn param_map(mut self, params: ParamMap) -> Self {
        self.param_map = params;
        self
    }

    /// Install the process-wide `tracing` subscriber at start (default: on).
    #[must_use]
    pub const fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    /// Forward every metric record to `sink`.
    #[must_use]
    pub fn reporter(mut self, sink: impl MetricSink + 'static) -> Self {
        self.reporter = Some(Box::new(sink));
        self
    }

    /// Build the `TrialConfig`.
    #[must_use]
    pub fn build(self) -> TrialConfig {
        TrialConfig {
            log_dir: self.log_dir.unwrap_or_else(default_log_dir),
            upload_dir: self.upload_dir,
            remote: self.remote,
            sync_period: self.sync_period,
            trial_prefix: self.trial_prefix,
            param_map: self.param_map,
            init_logging: self.init_logging,
            reporter: self.reporter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = TrialConfig::builder().log_dir("/tmp/t").build();
        assert_eq!(config.log_dir(), &PathBuf::from("/tmp/t"));
        assert_eq!(config.trial_prefix(), "");
        assert!(config.init_logging);
        assert!(config.sync_period().is_none());
    }

    #[test]
    fn test_zero_period_disables_sync() {
        let config = TrialConfig::builder().sync_period(Duration::ZERO).build();
        assert!(config.sync_period().is_none());
        let config = TrialConfig::builder().sync_period(Duration::from_secs(5)).build();
        assert_eq!(config.sync_period(), Some(Duration::from_secs(5)));
    }
}
