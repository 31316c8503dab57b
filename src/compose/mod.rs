//! Message drafting: the fixed fallback template and HTML rendering.

pub mod fallback;
pub mod html;

use crate::config::ProfileConfig;
use crate::contacts::Contact;

/// Everything a generator needs to write to one recipient
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    pub contact: &'a Contact,
    pub profile: &'a ProfileConfig,
    /// Research blurb about the recipient's company, when one was found
    pub research: Option<&'a str>,
}

/// Subject plus plain-text body; `**bold**` markers are allowed in the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

/// Where a draft came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Ai,
    Fallback,
}
