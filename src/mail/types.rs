use crate::compose::Draft;
use crate::compose::html::{render_html, render_plain};

/// A fully rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Plain-text alternative part
    pub plain: String,
}

impl OutgoingEmail {
    pub fn from_draft(to: &str, draft: &Draft) -> Self {
        Self {
            to: to.trim().to_string(),
            subject: draft.subject.clone(),
            html: render_html(&draft.body),
            plain: render_plain(&draft.body),
        }
    }
}
