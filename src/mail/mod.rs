pub mod smtp;
pub mod types;

pub use smtp::SmtpMailer;
pub use types::OutgoingEmail;

/// Why a delivery did not happen.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    /// The server rejected our login. Every later send would fail the same way.
    #[error("SMTP authentication failed: {0}")]
    Auth(String),

    #[error("Invalid recipient address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Delivery failed: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Errors that abort the whole run instead of failing one recipient
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeliveryError::Auth(_))
    }
}

/// Delivers one rendered message.
pub trait Mailer {
    /// Connect and authenticate without sending anything.
    async fn verify(&self) -> Result<(), DeliveryError>;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError>;
}

/// Check that `address` is a syntactically valid mailbox address.
pub fn validate_address(address: &str) -> Result<(), String> {
    address
        .trim()
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|e| e.to_string())
}
