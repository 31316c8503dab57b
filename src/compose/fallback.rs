//! Deterministic message used when AI generation fails.

use super::{Draft, MessageContext};

pub fn fallback_draft(ctx: &MessageContext<'_>) -> Draft {
    let contact = ctx.contact;
    let profile = ctx.profile;
    let company = contact.company_or_default();

    let hook = if ctx.research.is_some() {
        format!(
            "I've been following {}'s work and like the impact your team is having. ",
            company
        )
    } else {
        String::new()
    };

    let intro = if profile.experience.trim().is_empty() {
        format!("I am {}.", profile.name)
    } else {
        format!("I am {}, {}.", profile.name, profile.experience.trim())
    };

    let skills = if profile.skills.trim().is_empty() {
        String::new()
    } else {
        format!(
            " My skills in {} line up well with the work at {}.",
            profile.skills.trim(),
            company
        )
    };

    let mut signature = format!("Best regards,\n{}", profile.name);
    if !profile.linkedin.trim().is_empty() {
        signature.push_str(&format!("\nLinkedIn: {}", profile.linkedin.trim()));
    }
    if !profile.phone.trim().is_empty() {
        signature.push_str(&format!("\n{}", profile.phone.trim()));
    }

    let body = format!(
        "Dear {},\n\n{}{}{}\n\nI would love the chance to talk about how I could contribute to your team.\n\n{}",
        contact.first_name(),
        hook,
        intro,
        skills,
        signature
    );

    Draft {
        subject: format!("Application for Entry-Level Opportunity at {}", company),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::contacts::Contact;

    #[test]
    fn test_fallback_interpolates_contact_and_profile() {
        let config = test_config();
        let contact = Contact::new("Ms. Priya Sharma", "priya@acme.com", "Acme", "Recruiter");
        let draft = fallback_draft(&MessageContext {
            contact: &contact,
            profile: &config.profile,
            research: None,
        });

        assert_eq!(draft.subject, "Application for Entry-Level Opportunity at Acme");
        assert!(draft.body.starts_with("Dear Priya,\n\n"));
        assert!(draft.body.contains(
            "I am Jane Doe, a backend engineer with 2 years of experience."
        ));
        assert!(draft.body.contains("My skills in Rust, SQL line up well with the work at Acme."));
        assert!(draft.body.ends_with(
            "Best regards,\nJane Doe\nLinkedIn: https://www.linkedin.com/in/janedoe/"
        ));
        assert!(!draft.body.contains("following"));
    }

    #[test]
    fn test_fallback_mentions_company_only_with_research() {
        let config = test_config();
        let contact = Contact::new("Bob", "bob@globex.com", "Globex", "HR");
        let draft = fallback_draft(&MessageContext {
            contact: &contact,
            profile: &config.profile,
            research: Some("Globex is a multinational conglomerate."),
        });
        assert!(draft.body.contains("I've been following Globex's work"));
    }

    #[test]
    fn test_fallback_without_company() {
        let config = test_config();
        let contact = Contact::new("", "hr@example.com", "", "");
        let draft = fallback_draft(&MessageContext {
            contact: &contact,
            profile: &config.profile,
            research: None,
        });
        assert_eq!(
            draft.subject,
            "Application for Entry-Level Opportunity at your company"
        );
        assert!(draft.body.starts_with("Dear Hiring Manager,"));
    }
}
