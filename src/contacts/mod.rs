//! Recipients loaded from the contact list.

mod source;

pub use source::{ContactSourceError, load_contacts};

use crate::constants::DEFAULT_RECIPIENT_NAME;

const HONORIFICS: [&str; 4] = ["Mr", "Ms", "Mrs", "Dr"];

/// One row of the contact list. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub company: String,
    pub title: String,
}

impl Contact {
    pub fn new(name: &str, email: &str, company: &str, title: &str) -> Self {
        let name = name.trim();
        Self {
            name: if name.is_empty() {
                DEFAULT_RECIPIENT_NAME.to_string()
            } else {
                name.to_string()
            },
            email: email.trim().to_string(),
            company: company.trim().to_string(),
            title: title.trim().to_string(),
        }
    }

    /// Case-insensitive identity used for de-duplication and the sent log
    pub fn key(&self) -> String {
        normalize_email(&self.email)
    }

    /// First name with any leading honorific removed, for greetings
    pub fn first_name(&self) -> &str {
        if self.name == DEFAULT_RECIPIENT_NAME {
            return DEFAULT_RECIPIENT_NAME;
        }
        let mut rest = self.name.trim();
        for prefix in HONORIFICS {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                let (stripped, dotted) = match stripped.strip_prefix('.') {
                    Some(s) => (s, true),
                    None => (stripped, false),
                };
                // "Drew" must not lose its "Dr"
                if dotted || stripped.is_empty() || stripped.starts_with(char::is_whitespace) {
                    rest = stripped.trim_start();
                    break;
                }
            }
        }
        rest.split_whitespace()
            .next()
            .unwrap_or(DEFAULT_RECIPIENT_NAME)
    }

    /// Company name for copy, or a generic stand-in
    pub fn company_or_default(&self) -> &str {
        if is_placeholder_company(&self.company) {
            "your company"
        } else {
            &self.company
        }
    }

    pub fn title_or_default(&self) -> &str {
        if self.title.is_empty() || self.title.eq_ignore_ascii_case("nan") {
            "HR Professional"
        } else {
            &self.title
        }
    }
}

/// Trimmed, lowercased address used as the recipient key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank cells, spreadsheet "nan" exports and the generic stand-in are not real companies
pub fn is_placeholder_company(company: &str) -> bool {
    let company = company.trim();
    company.is_empty()
        || company.eq_ignore_ascii_case("nan")
        || company.eq_ignore_ascii_case("your company")
}
