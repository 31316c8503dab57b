use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::Contact;

#[derive(Debug, thiserror::Error)]
pub enum ContactSourceError {
    #[error("Contact list not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read contact list {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Contact list {0} has no Email column")]
    MissingEmailColumn(PathBuf),
}

/// Header names are lowercased before deserializing, so `Email`, `email`
/// and `EMAIL` all land here.
#[derive(Debug, Deserialize)]
struct ContactRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Contacts in file order, plus what was dropped on the way in
#[derive(Debug, Default)]
pub struct LoadedContacts {
    pub contacts: Vec<Contact>,
    /// Rows without a usable Email cell
    pub malformed: usize,
    /// Rows repeating an address seen earlier in the file
    pub duplicates: usize,
}

/// Read the CSV contact list at `path`.
///
/// Rows with an empty Email cell, or that fail to parse, are skipped with a
/// warning. A missing file or a header without an Email column is fatal.
pub fn load_contacts(path: &Path) -> Result<LoadedContacts, ContactSourceError> {
    if !path.exists() {
        return Err(ContactSourceError::NotFound(path.to_path_buf()));
    }

    let read_err = |source| ContactSourceError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;

    let headers: csv::StringRecord = reader
        .headers()
        .map_err(read_err)?
        .iter()
        .map(str::to_lowercase)
        .collect();
    if !headers.iter().any(|h| h == "email") {
        return Err(ContactSourceError::MissingEmailColumn(path.to_path_buf()));
    }
    reader.set_headers(headers.clone());

    let mut loaded = LoadedContacts::default();
    let mut seen = HashSet::new();

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(read_err(e)),
            Err(e) => {
                tracing::warn!("Skipping unreadable contact row: {}", e);
                loaded.malformed += 1;
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let row: ContactRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Skipping malformed contact row at line {}: {}", line, e);
                loaded.malformed += 1;
                continue;
            }
        };

        let email = row.email.unwrap_or_default();
        if email.trim().is_empty() || email.trim().eq_ignore_ascii_case("nan") {
            tracing::warn!("Skipping contact row at line {}: missing Email", line);
            loaded.malformed += 1;
            continue;
        }

        let contact = Contact::new(
            row.name.as_deref().unwrap_or_default(),
            &email,
            row.company.as_deref().unwrap_or_default(),
            row.title.as_deref().unwrap_or_default(),
        );

        if !seen.insert(contact.key()) {
            tracing::warn!(
                "Skipping duplicate contact {} at line {}",
                contact.email,
                line
            );
            loaded.duplicates += 1;
            continue;
        }

        loaded.contacts.push(contact);
    }

    tracing::info!(
        "Loaded {} contacts from {} ({} malformed, {} duplicate rows skipped)",
        loaded.contacts.len(),
        path.display(),
        loaded.malformed,
        loaded.duplicates
    );
    Ok(loaded)
}
