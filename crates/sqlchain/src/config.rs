use std::time::Duration;

/// Configuration for a [`DataSource`](crate::DataSource).
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Default strict mode for builders created through the data source.
    pub strict_mode: bool,
    /// Timeout applied to every statement executed on the PostgreSQL path.
    pub default_command_timeout: Option<Duration>,
    /// Truncate SQL in log events (in bytes). `None` means no truncation.
    pub log_sql_max_length: Option<usize>,
    /// Ignore the data source's audit rules.
    pub suppress_global_audit_rules: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            default_command_timeout: None,
            log_sql_max_length: Some(200),
            suppress_global_audit_rules: false,
        }
    }
}

impl ChainConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject argument members and desired columns that match nothing.
    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Set the statement timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.default_command_timeout = Some(duration);
        self
    }

    /// Set maximum SQL length to log.
    pub fn log_sql_max_length(mut self, len: usize) -> Self {
        self.log_sql_max_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.log_sql_max_length = None;
        self
    }

    pub fn suppress_global_audit_rules(mut self, on: bool) -> Self {
        self.suppress_global_audit_rules = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_setters() {
        let config = ChainConfig::new();
        assert!(!config.strict_mode);
        assert_eq!(config.log_sql_max_length, Some(200));

        let config = ChainConfig::new()
            .strict()
            .timeout(Duration::from_secs(5))
            .no_truncate();
        assert!(config.strict_mode);
        assert_eq!(config.default_command_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.log_sql_max_length, None);
    }
}
