use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL for the API. Optional — each provider has a sensible default.
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub recipient: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_name: default_from_name(),
            recipient: String::new(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Topic Master".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".topic-master")
}

fn default_store_dir() -> PathBuf {
    default_base_dir().join("store")
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_playlist_base_url")]
    pub playlist_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_items_per_source")]
    pub items_per_source: usize,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            playlist_base_url: default_playlist_base_url(),
            timeout_secs: default_timeout_secs(),
            items_per_source: default_items_per_source(),
        }
    }
}

fn default_playlist_base_url() -> String {
    "https://www.youtube.com/feeds/videos.xml".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_items_per_source() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_curriculum_name")]
    pub curriculum_name: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            curriculum_name: default_curriculum_name(),
            max_retries: default_max_retries(),
            initial_backoff_secs: default_initial_backoff_secs(),
        }
    }
}

fn default_curriculum_name() -> String {
    "System Design Curriculum".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_secs() -> u64 {
    4
}

impl Config {
    /// Overlay values from the process environment (or any lookup) on top of the file.
    /// Only the entry point calls this; components receive the finished struct.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("EMAIL_USER") {
            self.mail.username = v;
        }
        if let Some(v) = get("EMAIL_PASS") {
            self.mail.password = v;
        }
        if let Some(v) = get("TARGET_EMAIL") {
            self.mail.recipient = v;
        }
        if let Some(v) = get("TOPIC_MASTER_STORE") {
            self.store.dir = expand_tilde(&v);
        }
    }

    /// Fail before any state is touched when a credential the run needs is absent.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            anyhow::bail!("Missing AI API key. Set GEMINI_API_KEY or [llm] api_key.");
        }
        self.validate_mail()
    }

    pub fn validate_mail(&self) -> Result<()> {
        if self.mail.username.trim().is_empty() || self.mail.password.trim().is_empty() {
            anyhow::bail!(
                "Missing mailer credentials. Set EMAIL_USER/EMAIL_PASS or [mail] username/password."
            );
        }
        if self.mail.recipient.trim().is_empty() {
            anyhow::bail!("Missing recipient. Set TARGET_EMAIL or [mail] recipient.");
        }
        Ok(())
    }
}

/// Load the config file; a missing file yields the defaults.
pub fn load(path: &str) -> Result<Config> {
    let path = expand_tilde(path);
    if !path.exists() {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

/// Write the config template to `config_path` unless a file is already there,
/// and create the store directory.
pub async fn init_config_dir(config_path: &str, store_dir: &Path) -> Result<PathBuf> {
    let config_path = expand_tilde(config_path);
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::create_dir_all(store_dir).await?;

    if !config_path.exists() {
        tokio::fs::write(
            &config_path,
            r#"[llm]
provider = "google"
# base_url = "https://generativelanguage.googleapis.com/v1beta/openai"  # optional, uses provider default
model = "gemini-2.0-flash"
# api_key = "YOUR_API_KEY"  # or GEMINI_API_KEY
max_tokens = 8192

# Other provider examples:
# provider = "openai"
# model = "gpt-4o"
#
# provider = "anthropic"
# model = "claude-sonnet-4-5-20250929"

[mail]
smtp_host = "smtp.gmail.com"
smtp_port = 587
# username = "you@gmail.com"      # or EMAIL_USER
# password = "app-password"       # or EMAIL_PASS
# recipient = "you@example.com"   # or TARGET_EMAIL
from_name = "Topic Master"

# [store]
# dir = "~/.topic-master/store"   # or TOPIC_MASTER_STORE

[feeds]
playlist_base_url = "https://www.youtube.com/feeds/videos.xml"
timeout_secs = 30
items_per_source = 2

[report]
curriculum_name = "System Design Curriculum"
max_retries = 3
initial_backoff_secs = 4
"#,
        )
        .await?;
    }

    Ok(config_path)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.llm.provider, "google");
        assert_eq!(cfg.mail.smtp_port, 587);
        assert_eq!(cfg.feeds.items_per_source, 2);
        assert_eq!(cfg.report.max_retries, 3);
        assert_eq!(cfg.report.initial_backoff_secs, 4);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut cfg: Config = toml::from_str(
            r#"
            [llm]
            model = "from-file"
            api_key = "file-key"
            "#,
        )
        .unwrap();
        cfg.apply_env(env(&[
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("EMAIL_USER", "bot@example.com"),
            ("TOPIC_MASTER_STORE", "/tmp/tm-store"),
        ]));
        assert_eq!(cfg.llm.model, "gemini-2.5-pro");
        assert_eq!(cfg.llm.api_key, "file-key");
        assert_eq!(cfg.mail.username, "bot@example.com");
        assert_eq!(cfg.store.dir, PathBuf::from("/tmp/tm-store"));
    }

    #[test]
    fn test_blank_env_value_is_ignored() {
        let mut cfg = Config::default();
        cfg.llm.api_key = "kept".into();
        cfg.apply_env(env(&[("GEMINI_API_KEY", "  ")]));
        assert_eq!(cfg.llm.api_key, "kept");
    }

    #[test]
    fn test_validate_requires_api_key() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("EMAIL_USER", "u"),
            ("EMAIL_PASS", "p"),
            ("TARGET_EMAIL", "t@example.com"),
        ]));
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_validate_requires_mailer_credentials() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[("GEMINI_API_KEY", "k"), ("EMAIL_USER", "u")]));
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("EMAIL_PASS"));

        cfg.apply_env(env(&[("EMAIL_PASS", "p"), ("TARGET_EMAIL", "t@example.com")]));
        assert!(cfg.validate().is_ok());
    }

    #[tokio::test]
    async fn test_init_writes_template_at_given_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/custom.toml");
        let store_dir = tmp.path().join("store");

        let written = init_config_dir(path.to_str().unwrap(), &store_dir)
            .await
            .unwrap();
        assert_eq!(written, path);
        assert!(store_dir.is_dir());

        let cfg = load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.llm.model, "gemini-2.0-flash");
        assert_eq!(cfg.report.max_retries, 3);
    }

    #[tokio::test]
    async fn test_init_keeps_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[report]\nmax_retries = 5\n").unwrap();

        init_config_dir(path.to_str().unwrap(), &tmp.path().join("store"))
            .await
            .unwrap();
        assert_eq!(load(path.to_str().unwrap()).unwrap().report.max_retries, 5);
    }
}
