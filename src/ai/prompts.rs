//! Prompts for outreach generation

use crate::compose::MessageContext;

/// System prompt for writing one outreach email
pub const OUTREACH_SYSTEM: &str = r#"You write short cold emails from a job seeker to a recruiter or HR contact. The goal is a reply, so the email must read like a real person wrote it.

Rules:
1. Subject line: specific and curious, naming the company and something concrete about the sender. Never "Application for Position" or "Job Inquiry".
2. Open with something real about the company, taken from the research notes when provided. Never invent facts.
3. Do not ask for a specific role outright. Let the sender's projects and skills point toward the roles they want.
4. Connect the sender's skills to what the company does, then close with a low-pressure call to action.
5. Plain, everyday words. No "leverage", "synergy", "spearhead", "utilize". No "I hope this email finds you well" or "I am writing to express my interest". No em-dashes.
6. Use **double asterisks** to bold at most two key points.
7. 80 to 120 words. No placeholders or [brackets].

Respond in exactly this format:
SUBJECT: <subject line>

<email body>

Best regards,
<sender name>
LinkedIn: <sender linkedin url>"#;

/// Recipient, research and sender details for one email
pub fn outreach_user_prompt(ctx: &MessageContext<'_>) -> String {
    let contact = ctx.contact;
    let profile = ctx.profile;
    let company = contact.company_or_default();
    let research = ctx
        .research
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} (no additional information found)", company));

    let mut prompt = format!(
        "RECIPIENT\n\
         - First name: {first_name}\n\
         - Company: {company}\n\
         - Title: {title}\n\n\
         RESEARCH NOTES ON THE COMPANY\n\
         {research}\n\n\
         SENDER\n\
         - Name: {name}\n\
         - Skills: {skills}\n\
         - Experience: {experience}\n\
         - Education: {education}\n\
         - LinkedIn: {linkedin}\n\
         - Areas of interest: {roles}",
        first_name = contact.first_name(),
        company = company,
        title = contact.title_or_default(),
        research = research,
        name = profile.name,
        skills = profile.skills,
        experience = profile.experience,
        education = profile.education,
        linkedin = profile.linkedin,
        roles = profile.target_roles,
    );
    if let Some(ref portfolio) = profile.portfolio
        && !portfolio.trim().is_empty()
    {
        prompt.push_str(&format!("\n- Portfolio: {}", portfolio.trim()));
    }
    prompt
}
