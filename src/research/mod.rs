//! Company research used to personalize drafts.

mod web;

pub use web::WebResearcher;

/// Supplies a short blurb about a company.
///
/// Research is best-effort: `None` means nothing useful was found, and the
/// caller proceeds without personalization.
pub trait Researcher {
    async fn research(&self, company: &str) -> Option<String>;
}
