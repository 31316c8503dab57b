use super::{GenerationError, OpenRouterClient};
use super::prompts;
use crate::compose::{Draft, MessageContext};

/// Writes a personalized draft for one recipient. May fail; callers decide
/// whether to retry or fall back.
pub trait Generator {
    async fn generate(&self, ctx: &MessageContext<'_>) -> Result<Draft, GenerationError>;
}

pub struct OpenRouterGenerator {
    client: OpenRouterClient,
    max_tokens: u32,
}

impl OpenRouterGenerator {
    pub fn new(client: OpenRouterClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }
}

impl Generator for OpenRouterGenerator {
    async fn generate(&self, ctx: &MessageContext<'_>) -> Result<Draft, GenerationError> {
        let user_content = prompts::outreach_user_prompt(ctx);
        tracing::debug!(
            "Requesting draft for {} from {}",
            ctx.contact.email,
            self.client.model()
        );
        let content = self
            .client
            .complete(prompts::OUTREACH_SYSTEM, &user_content, self.max_tokens)
            .await?;
        parse_draft(&content, ctx.contact.company_or_default())
    }
}

/// Split a `SUBJECT: ...` completion into subject and body.
///
/// A completion without a subject line keeps its whole text as the body and
/// gets a generic subject. A completion with no body is an error.
pub fn parse_draft(content: &str, company: &str) -> Result<Draft, GenerationError> {
    let mut subject = None;
    let mut body_lines = Vec::new();

    for line in content.lines() {
        if subject.is_none() {
            let bare = line.trim().trim_start_matches(['*', '#']).trim_start();
            if let Some(prefix) = bare.get(..8)
                && prefix.eq_ignore_ascii_case("subject:")
            {
                let value =
                    bare[8..].trim_matches(|c: char| c == '*' || c == '"' || c.is_whitespace());
                subject = Some(value.to_string());
                continue;
            }
        }
        if subject.is_some() {
            body_lines.push(line);
        }
    }

    let (subject, body) = match subject {
        Some(subject) => (subject, body_lines.join("\n").trim().to_string()),
        None => (String::new(), content.trim().to_string()),
    };

    if body.is_empty() {
        return Err(GenerationError::Empty);
    }

    let subject = if subject.is_empty() {
        format!("Exploring Opportunities at {}", company)
    } else {
        subject
    };

    Ok(Draft { subject, body })
}
