use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ErrorCode;
use crate::fetch::DEFAULT_PAGE_SIZE;
use crate::rate_limit::{DEFAULT_BURST, DEFAULT_INTERVAL};
use crate::rpc::DEFAULT_RPC_PORT;

/// Written on first run so there is something to edit.
pub const DEFAULT_CONFIG: &str = r#"# ticketbench configuration

# Labels offered by the "Add label" action.
labels = ["sample label 1", "sample label 2"]

# Named searches offered by "Search / add issues", in menu order.
[[queries]]
name = "project foo"
query = 'project = "FOO"'

[[queries]]
name = "project bar"
query = 'project = "BAR"'

[[queries]]
name = "all"
query = ""

[favorites]
users = []

[client]
url = ""
# File holding a personal access token, sent as a bearer token.
token_file = ""

[selector]
command = "fzf"
args = ["--with-nth", "2..", "--reverse"]
rpc_port = 4378

[fetch]
page_size = 50

[executor]
interval_ms = 250
burst = 5
"#;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub queries: Vec<NamedQuery>,
    #[serde(default)]
    pub favorites: FavoritesConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritesConfig {
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token_file: String,
}

impl ClientConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Read the bearer token, if a token file is configured.
    ///
    /// # Errors
    ///
    /// Fails when the configured file cannot be read.
    pub fn read_token(&self) -> Result<Option<String>> {
        let path = self.token_file.trim();
        if path.is_empty() {
            return Ok(None);
        }
        let path = expand_home(path);
        let token = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        Ok(Some(token.trim().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_selector_command")]
    pub command: String,
    #[serde(default = "crate::selection::default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            command: default_selector_command(),
            args: crate::selection::default_args(),
            rpc_port: default_rpc_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_burst")]
    pub burst: usize,
}

impl ExecutorConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            burst: default_burst(),
        }
    }
}

impl Config {
    /// `<config dir>/ticketbench/config.toml`, if the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ticketbench/config.toml"))
    }

    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML or mistyped fields.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| {
            let code = ErrorCode::ConfigParseError;
            format!("{code}: {}", code.message())
        })
    }

    /// Load `path`, writing [`DEFAULT_CONFIG`] there first if it is missing.
    ///
    /// # Errors
    ///
    /// Fails when the default file cannot be written or the file does not
    /// parse.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            write_default(path)?;
            tracing::info!(path = %path.display(), "wrote default config");
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Query text for a named query.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.queries
            .iter()
            .find(|query| query.name == name)
            .map(|query| query.query.as_str())
    }
}

fn write_default(path: &Path) -> Result<()> {
    let fail = || {
        format!(
            "{}: {} at {}",
            ErrorCode::ConfigWriteFailed,
            ErrorCode::ConfigWriteFailed.message(),
            path.display()
        )
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(fail)?;
    }
    std::fs::write(path, DEFAULT_CONFIG).with_context(fail)
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn default_selector_command() -> String {
    "fzf".to_string()
}

const fn default_rpc_port() -> u16 {
    DEFAULT_RPC_PORT
}

const fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[allow(clippy::cast_possible_truncation)]
const fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

const fn default_burst() -> usize {
    DEFAULT_BURST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_parses_to_defaults() {
        let config = Config::parse(DEFAULT_CONFIG).expect("default config must parse");
        assert_eq!(config.selector, SelectorConfig::default());
        assert_eq!(config.fetch.page_size, 50);
        assert_eq!(config.executor.interval(), Duration::from_millis(250));
        assert_eq!(config.executor.burst, 5);
        assert_eq!(config.queries.len(), 3);
        assert_eq!(config.query("project foo"), Some(r#"project = "FOO""#));
        assert!(!config.client.is_configured());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::parse("labels = [\"ops\"]\n[fetch]\n").expect("parse");
        assert_eq!(config.labels, vec!["ops"]);
        assert_eq!(config.fetch.page_size, 50);
        assert_eq!(config.selector.rpc_port, 4378);
    }

    #[test]
    fn parse_error_carries_code() {
        let err = Config::parse("labels = [").unwrap_err();
        assert!(format!("{err:#}").contains("E1001"));
    }

    #[test]
    fn load_or_init_writes_default_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/config.toml");
        let config = Config::load_or_init(&path).expect("load");
        assert!(path.exists());
        assert_eq!(config, Config::parse(DEFAULT_CONFIG).expect("parse"));

        std::fs::write(&path, "[fetch]\npage_size = 7\n").expect("write");
        let config = Config::load_or_init(&path).expect("reload");
        assert_eq!(config.fetch.page_size, 7);
    }

    #[test]
    fn token_is_trimmed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let token = dir.path().join("token");
        std::fs::write(&token, "secret\n").expect("write");
        let client = ClientConfig {
            url: "https://tracker.example".into(),
            token_file: token.display().to_string(),
        };
        assert_eq!(client.read_token().expect("read").as_deref(), Some("secret"));
        assert_eq!(ClientConfig::default().read_token().expect("read"), None);
    }
}
