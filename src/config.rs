use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub representation: RepresentationConfig,
    #[serde(default)]
    pub cards: CardsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Budget for one invocation, signature check to response.
    #[serde(default = "default_invocation_timeout")]
    pub invocation_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Supports ${ENV_VAR} substitution
    pub primary_key: Option<String>,
    /// Supports ${ENV_VAR} substitution
    pub secondary_key: Option<String>,
    #[serde(default = "default_max_message_age")]
    pub max_message_age_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepresentationConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Retries after the first query before giving up.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CardsConfig {
    /// Edge length in pixels of face thumbnails.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_invocation_timeout() -> u64 {
    10
}

fn default_api_endpoint() -> String {
    "https://api.box.com/2.0".to_string()
}

fn default_max_message_age() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    10
}

fn default_thumbnail_size() -> u32 {
    45
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            invocation_timeout_secs: default_invocation_timeout(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            primary_key: None,
            secondary_key: None,
            max_message_age_secs: default_max_message_age(),
        }
    }
}

impl Default for RepresentationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: default_thumbnail_size(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs)
    }
}

impl PlatformConfig {
    /// API endpoint without a trailing slash, ready for path joining.
    pub fn api_base(&self) -> &str {
        self.api_endpoint.trim_end_matches('/')
    }

    pub fn max_message_age(&self) -> Duration {
        Duration::from_secs(self.max_message_age_secs)
    }
}

impl RepresentationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        // Expand environment variables like ${BOX_PRIMARY_KEY}
        let expanded = shellexpand::env(content)?;
        let mut config: Config = toml::from_str(&expanded)?;
        // An empty ${VAR} expansion leaves a blank key behind
        for key in [&mut config.platform.primary_key, &mut config.platform.secondary_key] {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *key = None;
            }
        }
        if config.platform.primary_key.is_none() && config.platform.secondary_key.is_none() {
            anyhow::bail!("[platform] needs at least one of primary_key / secondary_key");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[platform]
primary_key = "primary"
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.invocation_timeout(), Duration::from_secs(10));
        assert_eq!(config.platform.api_endpoint, "https://api.box.com/2.0");
        assert_eq!(config.platform.max_message_age(), Duration::from_secs(600));
        assert_eq!(config.representation.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.representation.max_poll_attempts, 10);
        assert_eq!(config.cards.thumbnail_size, 45);
        assert!(config.platform.secondary_key.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
[server]
host = "127.0.0.1"
port = 9000
invocation_timeout_secs = 25

[platform]
api_endpoint = "http://localhost:1234/2.0/"
primary_key = "p"
secondary_key = "s"
max_message_age_secs = 60

[representation]
poll_interval_ms = 250
max_poll_attempts = 3

[cards]
thumbnail_size = 64
"#,
        )
        .unwrap();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.platform.api_base(), "http://localhost:1234/2.0");
        assert_eq!(config.platform.secondary_key.as_deref(), Some("s"));
        assert_eq!(config.representation.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.cards.thumbnail_size, 64);
    }

    #[test]
    fn test_missing_keys_rejected() {
        let err = Config::parse("[platform]\n").unwrap_err();
        assert!(err.to_string().contains("primary_key"));
    }

    #[test]
    fn test_blank_keys_rejected() {
        let err = Config::parse("[platform]\nprimary_key = \"\"\nsecondary_key = \"  \"\n")
            .unwrap_err();
        assert!(err.to_string().contains("primary_key"));
    }

    #[test]
    fn test_blank_key_treated_as_absent() {
        let config =
            Config::parse("[platform]\nprimary_key = \"primary\"\nsecondary_key = \"\"\n").unwrap();
        assert_eq!(config.platform.primary_key.as_deref(), Some("primary"));
        assert!(config.platform.secondary_key.is_none());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("SKILLS_KIT_TEST_PRIMARY", "from-env");
        let config = Config::parse(
            r#"
[platform]
primary_key = "${SKILLS_KIT_TEST_PRIMARY}"
"#,
        )
        .unwrap();
        assert_eq!(config.platform.primary_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.platform.primary_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/skill.toml").is_err());
    }
}
