use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_DAILY_LIMIT, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_MAX_DELAY_SECS,
    DEFAULT_MIN_DELAY_SECS,
};
use crate::mail::validate_address;

/// Immutable run configuration, loaded once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sender: SenderConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub ai: AiConfig,
    pub profile: ProfileConfig,
    pub sending: SendingConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Directory relative paths are resolved against (the config file's directory)
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_server")]
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: default_smtp_server(),
            port: default_smtp_port(),
        }
    }
}

/// AI generation settings (OpenRouter chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ai_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: default_ai_model(),
            endpoint: default_ai_endpoint(),
            max_tokens: default_ai_max_tokens(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

/// The sender's own details, interpolated into prompts and the fallback template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub portfolio: Option<String>,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub target_roles: String,
    /// PDF attached to every message when present
    #[serde(default)]
    pub resume_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingConfig {
    #[serde(default = "default_daily_limit")]
    pub daily_limit: usize,
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    pub test_email: String,
    #[serde(default)]
    pub bcc: Option<String>,
    /// Recipients whose last delivery failed are candidates again on later runs
    #[serde(default = "default_true")]
    pub retry_failed: bool,
    /// End the run after this many delivery failures in a row; 0 never stops
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,
}

impl SendingConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.min_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_contacts_file")]
    pub contacts: PathBuf,
    #[serde(default = "default_sent_log_file")]
    pub sent_log: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            contacts: default_contacts_file(),
            sent_log: default_sent_log_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_research_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_research_timeout_secs(),
        }
    }
}

/// Sample recipient used by `--test`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default = "default_test_name")]
    pub name: String,
    #[serde(default = "default_test_company")]
    pub company: String,
    #[serde(default = "default_test_title")]
    pub title: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            name: default_test_name(),
            company: default_test_company(),
            title: default_test_title(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to this file (ANSI disabled)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_ai_model() -> String {
    "arcee-ai/trinity-large-preview:free".to_string()
}

fn default_ai_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_ai_max_tokens() -> u32 {
    600
}

fn default_ai_timeout_secs() -> u64 {
    60
}

fn default_daily_limit() -> usize {
    DEFAULT_DAILY_LIMIT
}

fn default_min_delay_secs() -> u64 {
    DEFAULT_MIN_DELAY_SECS
}

fn default_max_delay_secs() -> u64 {
    DEFAULT_MAX_DELAY_SECS
}

fn default_true() -> bool {
    true
}

fn default_max_consecutive_failures() -> usize {
    DEFAULT_MAX_CONSECUTIVE_FAILURES
}

fn default_contacts_file() -> PathBuf {
    PathBuf::from("HR_Contact_List.csv")
}

fn default_sent_log_file() -> PathBuf {
    PathBuf::from("sent_log.csv")
}

fn default_research_timeout_secs() -> u64 {
    10
}

fn default_test_name() -> String {
    "Test HR".to_string()
}

fn default_test_company() -> String {
    "Google".to_string()
}

fn default_test_title() -> String {
    "HR Manager".to_string()
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("coldmail");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load from an explicit path, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}\n\
                 Please create a config file. Example:\n\n\
                 [sender]\n\
                 email = \"you@gmail.com\"\n\n\
                 [profile]\n\
                 name = \"Your Name\"\n\
                 linkedin = \"https://www.linkedin.com/in/you/\"\n\n\
                 [sending]\n\
                 test_email = \"you+test@gmail.com\"",
                path.display()
            );
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self::from_toml(&content, base_dir)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate config text. Relative paths resolve against `base_dir`.
    pub fn from_toml(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sending.daily_limit == 0 {
            anyhow::bail!("sending.daily_limit must be a positive integer");
        }
        if self.sending.min_delay_secs > self.sending.max_delay_secs {
            anyhow::bail!(
                "sending.min_delay_secs ({}) is greater than sending.max_delay_secs ({})",
                self.sending.min_delay_secs,
                self.sending.max_delay_secs
            );
        }
        if let Err(reason) = validate_address(&self.sender.email) {
            anyhow::bail!(
                "sender.email is not a valid address ({}): {}",
                reason,
                self.sender.email
            );
        }
        if let Err(reason) = validate_address(&self.sending.test_email) {
            anyhow::bail!(
                "sending.test_email is not a valid address ({}): {}",
                reason,
                self.sending.test_email
            );
        }
        if let Some(bcc) = self.bcc()
            && let Err(reason) = validate_address(bcc)
        {
            anyhow::bail!("sending.bcc is not a valid address ({}): {}", reason, bcc);
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn contacts_path(&self) -> PathBuf {
        self.resolve(&self.files.contacts)
    }

    pub fn sent_log_path(&self) -> PathBuf {
        self.resolve(&self.files.sent_log)
    }

    pub fn resume_path(&self) -> Option<PathBuf> {
        self.profile.resume_path.as_deref().map(|p| self.resolve(p))
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.logging.file.as_deref().map(|p| self.resolve(p))
    }

    /// BCC address, treating an empty string as unset
    pub fn bcc(&self) -> Option<&str> {
        self.sending
            .bcc
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MINIMAL: &str = r#"
        [sender]
        email = "me@example.com"

        [profile]
        name = "Jane Doe"
        linkedin = "https://www.linkedin.com/in/janedoe/"
        skills = "Rust, SQL"
        experience = "a backend engineer with 2 years of experience"

        [sending]
        test_email = "me+test@example.com"
    "#;

    pub(crate) fn test_config() -> Config {
        Config::from_toml(MINIMAL, PathBuf::from("/srv/outreach")).unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = test_config();
        assert_eq!(config.sending.daily_limit, 10);
        assert_eq!(config.sending.min_delay(), Duration::from_secs(120));
        assert_eq!(config.sending.max_delay(), Duration::from_secs(480));
        assert!(config.sending.retry_failed);
        assert_eq!(config.sending.max_consecutive_failures, 3);
        assert_eq!(config.smtp.server, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.test.company, "Google");
        assert!(config.research.enabled);
        assert_eq!(config.bcc(), None);
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let config = test_config();
        assert_eq!(
            config.contacts_path(),
            PathBuf::from("/srv/outreach/HR_Contact_List.csv")
        );
        assert_eq!(
            config.sent_log_path(),
            PathBuf::from("/srv/outreach/sent_log.csv")
        );
        assert_eq!(config.resume_path(), None);
    }

    #[test]
    fn test_absolute_paths_kept() {
        let toml = format!("{MINIMAL}\n[files]\nsent_log = \"/var/lib/coldmail/log.csv\"\n");
        let config = Config::from_toml(&toml, PathBuf::from("/srv/outreach")).unwrap();
        assert_eq!(
            config.sent_log_path(),
            PathBuf::from("/var/lib/coldmail/log.csv")
        );
    }

    #[test]
    fn test_zero_daily_limit_rejected() {
        let toml = MINIMAL.replace(
            "[sending]",
            "[sending]\ndaily_limit = 0",
        );
        assert!(Config::from_toml(&toml, PathBuf::from(".")).is_err());
    }

    #[test]
    fn test_inverted_delay_bounds_rejected() {
        let toml = MINIMAL.replace(
            "[sending]",
            "[sending]\nmin_delay_secs = 600\nmax_delay_secs = 60",
        );
        let err = Config::from_toml(&toml, PathBuf::from(".")).unwrap_err();
        assert!(format!("{err:#}").contains("min_delay_secs"));
    }

    #[test]
    fn test_invalid_test_email_rejected() {
        let toml = MINIMAL.replace("me+test@example.com", "not-an-address");
        assert!(Config::from_toml(&toml, PathBuf::from(".")).is_err());
    }

    #[test]
    fn test_addresses_checked_with_mailbox_parser() {
        let toml = MINIMAL.replace("me@example.com", "a b@example.com");
        let err = Config::from_toml(&toml, PathBuf::from(".")).unwrap_err();
        assert!(format!("{err:#}").contains("sender.email"));

        let toml = MINIMAL.replace("[sending]", "[sending]\nbcc = \"me+sent@@example.com\"");
        let err = Config::from_toml(&toml, PathBuf::from(".")).unwrap_err();
        assert!(format!("{err:#}").contains("sending.bcc"));
    }

    #[test]
    fn test_empty_bcc_treated_as_unset() {
        let toml = MINIMAL.replace("[sending]", "[sending]\nbcc = \"  \"");
        let config = Config::from_toml(&toml, PathBuf::from(".")).unwrap();
        assert_eq!(config.bcc(), None);
    }

    #[test]
    fn test_missing_config_file_explains_format() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("[sender]"));
    }
}
