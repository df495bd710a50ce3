use crate::transaction::IsolationLevel;
use std::time::Duration;

/// Database configuration
///
/// Parsed from `memory://<name>?isolation=<level>&lock_timeout_ms=<ms>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Database name
    pub name: String,

    /// Isolation used when a transaction does not ask for one
    pub isolation: IsolationLevel,

    /// How long a write waits for the storage lock
    pub lock_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            isolation: IsolationLevel::default(),
            lock_timeout: Duration::from_secs(5),
        }
    }

    /// Set the default isolation level
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    /// Set the write lock timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Parse from connection string
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = DatabaseConfig::from_url("memory://kompagnon?isolation=serializable")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        let rest = url
            .strip_prefix("memory://")
            .ok_or_else(|| "URL must start with 'memory://'".to_string())?;

        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };
        if name.is_empty() {
            return Err("Database name cannot be empty".to_string());
        }

        let mut config = Self::new(name);
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid parameter '{}'", pair))?;
            match key {
                "isolation" => config.isolation = value.parse()?,
                "lock_timeout_ms" => {
                    let millis: u64 = value
                        .parse()
                        .map_err(|_| format!("Invalid lock_timeout_ms '{}'", value))?;
                    config.lock_timeout = Duration::from_millis(millis);
                }
                other => return Err(format!("Unknown parameter '{}'", other)),
            }
        }
        Ok(config)
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        format!(
            "memory://{}?isolation={}&lock_timeout_ms={}",
            self.name,
            self.isolation.to_string().replace(' ', "_"),
            self.lock_timeout.as_millis()
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("kompagnon")
    }
}
