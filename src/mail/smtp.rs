use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::Path;

use super::types::OutgoingEmail;
use super::{DeliveryError, Mailer};
use crate::config::Config;

/// Reply codes for rejected or missing authentication
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

/// Resume PDF read once at startup and attached to every message
struct ResumeAttachment {
    filename: String,
    content: Vec<u8>,
    content_type: ContentType,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    bcc: Option<Mailbox>,
    resume: Option<ResumeAttachment>,
}

impl SmtpMailer {
    pub fn new(config: &Config, password: &SecretString) -> Result<Self> {
        let creds = Credentials::new(
            config.sender.email.clone(),
            password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp.server)
            .context("Failed to create SMTP transport")?
            .port(config.smtp.port)
            .credentials(creds)
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .build();

        let address = config
            .sender
            .email
            .trim()
            .parse()
            .context("Invalid sender address")?;
        let from = Mailbox::new(config.sender.display_name.clone(), address);

        let bcc = config
            .bcc()
            .map(|bcc| bcc.parse::<Mailbox>())
            .transpose()
            .context("Invalid BCC address")?;

        let resume = config
            .resume_path()
            .and_then(|path| load_resume(&path, &config.profile.name));

        Ok(Self {
            transport,
            from,
            bcc,
            resume,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, DeliveryError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::InvalidAddress {
                address: email.to.clone(),
                reason: e.to_string(),
            })?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);

        if let Some(ref bcc) = self.bcc {
            builder = builder.bcc(bcc.clone());
        }

        let body = MultiPart::alternative_plain_html(email.plain.clone(), email.html.clone());
        let message = match self.resume {
            Some(ref resume) => builder.multipart(
                MultiPart::mixed().multipart(body).singlepart(
                    Attachment::new(resume.filename.clone())
                        .body(resume.content.clone(), resume.content_type.clone()),
                ),
            ),
            None => builder.multipart(body),
        };

        message.map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

impl Mailer for SmtpMailer {
    async fn verify(&self) -> Result<(), DeliveryError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::Transport(
                "SMTP server did not accept the connection".to_string(),
            )),
            Err(e) => Err(classify(e)),
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let message = self.build_message(email)?;
        self.transport.send(message).await.map_err(classify)?;
        tracing::info!("Email sent to {}", email.to);
        Ok(())
    }
}

fn classify(err: lettre::transport::smtp::Error) -> DeliveryError {
    let is_auth = err
        .status()
        .is_some_and(|code| AUTH_FAILURE_CODES.contains(&code.to_string().as_str()));
    if is_auth {
        DeliveryError::Auth(err.to_string())
    } else {
        DeliveryError::Transport(err.to_string())
    }
}

/// "Jane Q Doe" -> "Jane_Q_Doe_Resume.pdf"
fn resume_filename(name: &str) -> String {
    let stem = name.split_whitespace().collect::<Vec<_>>().join("_");
    if stem.is_empty() {
        "Resume.pdf".to_string()
    } else {
        format!("{}_Resume.pdf", stem)
    }
}

fn load_resume(path: &Path, name: &str) -> Option<ResumeAttachment> {
    if !path.exists() {
        tracing::warn!(
            "Resume not found at {}, sending without attachment",
            path.display()
        );
        return None;
    }

    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(
                "Failed to read resume {}: {}. Sending without attachment",
                path.display(),
                e
            );
            return None;
        }
    };

    let content_type = match ContentType::parse("application/pdf") {
        Ok(content_type) => content_type,
        Err(e) => {
            tracing::warn!("Unsupported resume content type: {}", e);
            return None;
        }
    };

    tracing::debug!("Attaching resume {} ({} bytes)", path.display(), content.len());
    Some(ResumeAttachment {
        filename: resume_filename(name),
        content,
        content_type,
    })
}
