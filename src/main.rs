mod ai;
mod cli;
mod compose;
mod config;
mod constants;
mod contacts;
mod credentials;
mod mail;
mod pacing;
mod research;
mod retry;
mod runner;
mod sent_log;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::{OpenRouterClient, OpenRouterGenerator};
use crate::cli::{Cli, Command, run_mode};
use crate::config::Config;
use crate::credentials::{CredentialStore, SecretKind};
use crate::mail::{Mailer, SmtpMailer, validate_address};
use crate::pacing::format_delay;
use crate::research::WebResearcher;
use crate::runner::{BatchRunner, Plan, RunMode, RunSummary};
use crate::sent_log::SentLog;

const STARTER_CONFIG: &str = r#"[sender]
email = "{email}"
# display_name = "Your Name"

[profile]
name = "Your Name"
phone = ""
linkedin = "https://www.linkedin.com/in/you/"
skills = "Python, SQL, Rust"
experience = "a recent graduate with internship experience in backend development"
education = ""
target_roles = "Software Engineer, Backend Developer"
# resume_path = "resume.pdf"

[sending]
test_email = "{email}"
daily_limit = 10
min_delay_secs = 120
max_delay_secs = 480
# bcc = "you+sent@example.com"
retry_failed = true
max_consecutive_failures = 3

[files]
contacts = "HR_Contact_List.csv"
sent_log = "sent_log.csv"
"#;

fn setup_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = log_file
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        })
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
}

async fn run_batch(config: &Config, mode: RunMode, auto: bool) -> Result<()> {
    let store = CredentialStore::new(&config.sender.email);
    let credentials = store.load().context(
        "Missing credentials. Run 'coldmail setup' or set COLDMAIL_SMTP_PASSWORD and OPENROUTER_API_KEY",
    )?;

    let client = OpenRouterClient::new(&config.ai, credentials.api_key)?;
    let generator = OpenRouterGenerator::new(client, config.ai.max_tokens);
    let researcher = WebResearcher::new(&config.research)?;
    let mailer = SmtpMailer::new(config, &credentials.smtp_password)?;

    let runner = BatchRunner::new(config, researcher, generator, mailer);
    let summary = runner
        .run(mode, |plan| confirm_plan(plan, mode, auto))
        .await?;

    print_summary(&summary);
    if mode == RunMode::Test && summary.failed > 0 {
        anyhow::bail!("Test email was not delivered");
    }
    Ok(())
}

/// Print the plan and ask for a literal "YES" unless `auto` is set.
fn confirm_plan(plan: &Plan, mode: RunMode, auto: bool) -> bool {
    println!();
    if mode == RunMode::Resume {
        println!("{} emails remaining to send", plan.candidates.len());
    }
    println!(
        "Contacts: {} | Already sent: {} | Excluded: {} | Malformed rows: {} | Duplicates: {}",
        plan.total_contacts, plan.already_sent, plan.excluded, plan.malformed, plan.duplicates
    );
    println!(
        "This run sends up to {} emails (daily limit {}).",
        plan.this_run(),
        plan.daily_limit
    );

    if auto {
        println!("Auto mode, starting without confirmation.");
        return true;
    }

    print!("Type YES to start sending: ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(_) => input.trim() == "YES",
        Err(_) => false,
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.cancelled {
        println!("Cancelled. Nothing was sent.");
        return;
    }
    println!("{}", summary);
    if summary.fallbacks > 0 {
        println!("Fallback template used for {} emails.", summary.fallbacks);
    }
    if summary.paced > 0 {
        println!(
            "Waited {} across {} pauses.",
            format_delay(summary.total_wait),
            summary.paced
        );
    }
    if summary.stopped_after_failures {
        println!(
            "Stopped after repeated delivery failures. {} contacts left for the next run.",
            summary.remaining
        );
    }
    if summary.stopped_at_quota {
        println!(
            "Daily limit reached. {} contacts left for the next run (use --resume).",
            summary.remaining
        );
    }
}

async fn run_check(config: &Config) -> Result<()> {
    println!("Config OK");
    println!(
        "  Contacts: {}{}",
        config.contacts_path().display(),
        if config.contacts_path().exists() {
            ""
        } else {
            " (missing)"
        }
    );
    let sent_log = SentLog::new(config.sent_log_path());
    println!(
        "  Sent log: {} ({} already sent)",
        sent_log.path().display(),
        sent_log.load()?.len()
    );
    if let Some(resume) = config.resume_path() {
        println!(
            "  Resume:   {}{}",
            resume.display(),
            if resume.exists() { "" } else { " (missing)" }
        );
    }
    println!();

    let store = CredentialStore::new(&config.sender.email);
    print!("{}", store.debug_info());
    if !store.has(SecretKind::ApiKey) {
        println!("Warning: no OpenRouter API key stored.");
    }

    let password = store.get(SecretKind::SmtpPassword)?;
    let mailer = SmtpMailer::new(config, &password)?;
    mailer.verify().await?;
    println!(
        "\nSMTP login OK ({}:{} as {})",
        config.smtp.server, config.smtp.port, config.sender.email
    );
    Ok(())
}

fn run_setup(config_path: Option<&Path>) -> Result<()> {
    println!("coldmail setup");
    println!("==============\n");

    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => Config::config_path()?,
    };

    let email = if path.exists() {
        let config = Config::load(Some(&path))?;
        println!("Using sender {} from {}", config.sender.email, path.display());
        config.sender.email
    } else {
        let email = prompt_email()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, STARTER_CONFIG.replace("{email}", &email))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "Wrote a starter config to {}. Fill in your profile before sending.",
            path.display()
        );
        email
    };

    let store = CredentialStore::new(&email);
    prompt_secret(&store, SecretKind::SmtpPassword, "SMTP app password")?;
    prompt_secret(&store, SecretKind::ApiKey, "OpenRouter API key")?;

    println!("\nSetup complete! Try 'coldmail run --test'.");
    Ok(())
}

fn prompt_email() -> Result<String> {
    loop {
        print!("Sender email address: ");
        io::stdout().flush()?;
        let mut email = String::new();
        if io::stdin().read_line(&mut email)? == 0 {
            anyhow::bail!("No sender address given");
        }
        let email = email.trim().to_string();

        match validate_address(&email) {
            Ok(()) => return Ok(email),
            Err(reason) => println!("Invalid email address ({}). Try again.", reason),
        }
    }
}

fn prompt_secret(store: &CredentialStore, kind: SecretKind, label: &str) -> Result<()> {
    let stored = store.has(kind);
    if stored {
        print!("{} (leave empty to keep the stored one): ", label);
    } else {
        print!("{}: ", label);
    }
    io::stdout().flush()?;

    let secret = read_hidden()?;
    println!();

    if secret.is_empty() {
        if !stored {
            println!("No {} stored; set it later with 'coldmail setup'.", label);
        }
        return Ok(());
    }

    store.set(kind, &secret)?;
    println!("{} stored.", label);
    Ok(())
}

/// Read one line with terminal echo off. Piped input is read as-is.
fn read_hidden() -> Result<String> {
    let _guard = DisableEcho::new().ok();

    let mut secret = String::new();
    io::stdin().read_line(&mut secret)?;
    Ok(secret.trim().to_string())
}

struct DisableEcho {
    #[cfg(unix)]
    original: libc::termios,
}

impl DisableEcho {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use std::mem::MaybeUninit;
        use std::os::unix::io::AsRawFd;

        let fd = io::stdin().as_raw_fd();
        let mut termios = MaybeUninit::<libc::termios>::uninit();

        unsafe {
            if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
                anyhow::bail!("Failed to get terminal attributes");
            }
            let original = termios.assume_init();
            let mut hidden = original;
            hidden.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(fd, libc::TCSANOW, &hidden) != 0 {
                anyhow::bail!("Failed to set terminal attributes");
            }
            Ok(Self { original })
        }
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for DisableEcho {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        let fd = io::stdin().as_raw_fd();
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &self.original);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Setup => run_setup(cli.config.as_deref()),
        Command::Check => {
            let config = Config::load(cli.config.as_deref())?;
            setup_logging(config.log_file_path().as_deref());
            run_check(&config).await
        }
        Command::Run { test, resume, auto } => {
            let config = Config::load(cli.config.as_deref())?;
            setup_logging(config.log_file_path().as_deref());
            run_batch(&config, run_mode(test, resume), auto).await
        }
    }
}
