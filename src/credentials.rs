use anyhow::Result;
use secrecy::SecretString;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::constants::KEYRING_SERVICE;

const ENV_SMTP_PASSWORD: &str = "COLDMAIL_SMTP_PASSWORD";
const ENV_API_KEY: &str = "OPENROUTER_API_KEY";

/// Which secret is being looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    SmtpPassword,
    ApiKey,
}

impl SecretKind {
    fn env_var(self) -> &'static str {
        match self {
            SecretKind::SmtpPassword => ENV_SMTP_PASSWORD,
            SecretKind::ApiKey => ENV_API_KEY,
        }
    }

    fn key_prefix(self) -> &'static str {
        match self {
            SecretKind::SmtpPassword => "smtp",
            SecretKind::ApiKey => "openrouter",
        }
    }
}

/// Secrets resolved once at startup
pub struct Credentials {
    pub smtp_password: SecretString,
    pub api_key: SecretString,
}

/// Debug information about credential storage backends
#[derive(Debug, Clone)]
pub struct CredentialDebugInfo {
    pub keyring_available: bool,
    pub smtp_env_set: bool,
    pub api_key_env_set: bool,
    pub smtp_file: PathBuf,
    pub api_key_file: PathBuf,
}

impl std::fmt::Display for CredentialDebugInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Credential Storage Status:")?;
        writeln!(
            f,
            "  Keyring: {}",
            if self.keyring_available {
                "available"
            } else {
                "unavailable"
            }
        )?;
        writeln!(
            f,
            "  Environment var ({}): {}",
            ENV_SMTP_PASSWORD,
            if self.smtp_env_set { "set" } else { "not set" }
        )?;
        writeln!(
            f,
            "  Environment var ({}): {}",
            ENV_API_KEY,
            if self.api_key_env_set { "set" } else { "not set" }
        )?;
        writeln!(f, "  SMTP file fallback: {}", self.smtp_file.display())?;
        writeln!(f, "  API key file fallback: {}", self.api_key_file.display())?;
        Ok(())
    }
}

/// Layered secret lookup: environment, then OS keyring, then a 0600 file.
pub struct CredentialStore {
    email: String,
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(email: &str) -> Self {
        let dir = crate::config::Config::config_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_dir(email, dir)
    }

    pub fn with_dir(email: &str, dir: PathBuf) -> Self {
        Self {
            email: email.to_string(),
            dir,
        }
    }

    fn secret_file(&self, kind: SecretKind) -> PathBuf {
        let safe_email = self.email.replace(['@', '.', '/', '\\', ':'], "_");
        self.dir
            .join(format!(".{}_{}", kind.key_prefix(), safe_email))
    }

    fn keyring_key(&self, kind: SecretKind) -> String {
        format!("{}:{}", kind.key_prefix(), self.email)
    }

    pub fn debug_info(&self) -> CredentialDebugInfo {
        let test_key = format!("test:{}", self.email);
        let keyring_available = if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &test_key)
        {
            entry.set_password("__test__").is_ok()
                && entry.get_password().is_ok()
                && entry.delete_credential().is_ok()
        } else {
            false
        };

        CredentialDebugInfo {
            keyring_available,
            smtp_env_set: Self::env_secret(SecretKind::SmtpPassword).is_some(),
            api_key_env_set: Self::env_secret(SecretKind::ApiKey).is_some(),
            smtp_file: self.secret_file(SecretKind::SmtpPassword),
            api_key_file: self.secret_file(SecretKind::ApiKey),
        }
    }

    fn env_secret(kind: SecretKind) -> Option<String> {
        env::var(kind.env_var())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn keyring_get(&self, key: &str) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, key).ok()?;
        entry.get_password().ok()
    }

    fn keyring_set(&self, key: &str, secret: &str) -> bool {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, key) {
            entry.set_password(secret).is_ok()
        } else {
            false
        }
    }

    fn file_get(&self, kind: SecretKind) -> Option<String> {
        fs::read_to_string(self.secret_file(kind))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn file_set(&self, kind: SecretKind, secret: &str) -> Result<()> {
        let path = self.secret_file(kind);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Create file with restricted permissions atomically to avoid TOCTOU
        #[cfg(unix)]
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            file.write_all(secret.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, secret)?;
        }

        Ok(())
    }

    fn lookup(&self, kind: SecretKind) -> Option<String> {
        Self::env_secret(kind)
            .or_else(|| self.keyring_get(&self.keyring_key(kind)))
            .or_else(|| self.file_get(kind))
    }

    pub fn get(&self, kind: SecretKind) -> Result<SecretString> {
        let secret = self.lookup(kind).ok_or_else(|| {
            anyhow::anyhow!(
                "{} not found. Set {} or run 'coldmail setup'.",
                match kind {
                    SecretKind::SmtpPassword => "SMTP password",
                    SecretKind::ApiKey => "OpenRouter API key",
                },
                kind.env_var()
            )
        })?;

        // Gmail displays app passwords in groups of four
        let secret = match kind {
            SecretKind::SmtpPassword => secret.replace(' ', ""),
            SecretKind::ApiKey => secret,
        };
        Ok(SecretString::from(secret))
    }

    pub fn set(&self, kind: SecretKind, secret: &str) -> Result<()> {
        let key = self.keyring_key(kind);
        if self.keyring_set(&key, secret) && self.keyring_get(&key).is_some() {
            return Ok(());
        }

        eprintln!("Note: Keyring unavailable, using file-based storage.");
        self.file_set(kind, secret)
    }

    pub fn has(&self, kind: SecretKind) -> bool {
        self.lookup(kind).is_some()
    }

    /// Resolve both secrets; missing either is a setup failure.
    pub fn load(&self) -> Result<Credentials> {
        Ok(Credentials {
            smtp_password: self.get(SecretKind::SmtpPassword)?,
            api_key: self.get(SecretKind::ApiKey)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    // Mutex to prevent parallel test interference with env vars
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_env(key: &str, value: &str) {
        // SAFETY: env access in these tests is serialized by ENV_MUTEX.
        unsafe { env::set_var(key, value) };
    }

    fn remove_env(key: &str) {
        // SAFETY: env access in these tests is serialized by ENV_MUTEX.
        unsafe { env::remove_var(key) };
    }

    #[test]
    fn test_env_smtp_password_strips_spaces() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        set_env(ENV_SMTP_PASSWORD, "abcd efgh ijkl mnop");
        let store = CredentialStore::with_dir("test@example.com", dir.path().to_path_buf());
        let pwd = store.get(SecretKind::SmtpPassword).unwrap();
        assert_eq!(pwd.expose_secret(), "abcdefghijklmnop");
        remove_env(ENV_SMTP_PASSWORD);
    }

    #[test]
    fn test_secret_files_are_per_kind_and_email() {
        let dir = PathBuf::from("/tmp/coldmail-test");
        let store1 = CredentialStore::with_dir("user1@example.com", dir.clone());
        let store2 = CredentialStore::with_dir("user2@example.com", dir);

        assert_ne!(
            store1.secret_file(SecretKind::SmtpPassword),
            store2.secret_file(SecretKind::SmtpPassword)
        );
        assert_ne!(
            store1.secret_file(SecretKind::SmtpPassword),
            store1.secret_file(SecretKind::ApiKey)
        );
        let name = store1.secret_file(SecretKind::ApiKey);
        let name = name.file_name().unwrap().to_string_lossy();
        assert_eq!(name, ".openrouter_user1_example_com");
    }

    #[test]
    fn test_file_fallback_roundtrip() {
        let _guard = ENV_MUTEX.lock().unwrap();
        remove_env(ENV_API_KEY);
        let dir = tempfile::tempdir().unwrap();
        let email = format!("file_fallback_{}@example.com", std::process::id());
        let store = CredentialStore::with_dir(&email, dir.path().to_path_buf());

        store.file_set(SecretKind::ApiKey, "sk-or-v1-test\n").unwrap();
        assert_eq!(
            store.file_get(SecretKind::ApiKey),
            Some("sk-or-v1-test".to_string())
        );
        assert!(store.has(SecretKind::ApiKey));
    }

    #[test]
    fn test_env_takes_priority_over_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let email = format!("priority_{}@example.com", std::process::id());
        let store = CredentialStore::with_dir(&email, dir.path().to_path_buf());

        store.file_set(SecretKind::ApiKey, "from-file").unwrap();
        set_env(ENV_API_KEY, "from-env");
        assert_eq!(store.get(SecretKind::ApiKey).unwrap().expose_secret(), "from-env");
        remove_env(ENV_API_KEY);
    }

    #[test]
    fn test_debug_info_display() {
        let store = CredentialStore::with_dir("debug@example.com", PathBuf::from("/tmp/x"));
        let display = format!("{}", store.debug_info());
        assert!(display.contains("Credential Storage Status:"));
        assert!(display.contains(ENV_SMTP_PASSWORD));
        assert!(display.contains("debug_example_com"));
    }
}
