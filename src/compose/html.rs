//! Plain-text drafts to HTML mail bodies.
//!
//! Drafts are plain text with `**bold**` markers. URLs become links, and a
//! `LinkedIn: <url>` line collapses to a single "LinkedIn" link.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<label>LinkedIn:\s*)?(?P<url>https?://[^\s<>"]+)"#).expect("valid link regex")
});

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold regex"));

const LINK_STYLE: &str = "color: #0077B5; text-decoration: none;";
const BODY_STYLE: &str = "font-family: Arial, sans-serif; font-size: 14px; line-height: 1.6; color: #333;";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Sentence punctuation and closing bold markers directly after a URL are not
/// part of it
fn split_trailing_punctuation(url: &str) -> (&str, &str) {
    let trimmed = url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '*']);
    url.split_at(trimmed.len())
}

fn linkify(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    let mut last = 0;

    for caps in LINK_RE.captures_iter(text) {
        let (Some(whole), Some(url)) = (caps.get(0), caps.name("url")) else {
            continue;
        };
        out.push_str(&escape(&text[last..whole.start()]));

        let (url, trailing) = split_trailing_punctuation(url.as_str());
        let label = if caps.name("label").is_some() {
            "LinkedIn".to_string()
        } else {
            escape(url)
        };
        out.push_str(&format!(
            r#"<a href="{}" style="{}">{}</a>"#,
            escape(url),
            LINK_STYLE,
            label
        ));
        out.push_str(&escape(trailing));
        last = whole.end();
    }

    out.push_str(&escape(&text[last..]));
    out
}

/// Render a draft body as a styled HTML document.
pub fn render_html(body: &str) -> String {
    let text = linkify(body);
    let text = BOLD_RE.replace_all(&text, |caps: &Captures| {
        format!("<strong>{}</strong>", &caps[1])
    });
    let text = text.replace('\n', "<br>\n");

    format!(
        "<html>\n<body style=\"{}\">\n{}\n</body>\n</html>\n",
        BODY_STYLE, text
    )
}

/// Plain-text alternative: the draft with bold markers removed.
pub fn render_plain(body: &str) -> String {
    BOLD_RE.replace_all(body, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_markers_become_strong() {
        let html = render_html("I build **secure login systems** daily.");
        assert!(html.contains("I build <strong>secure login systems</strong> daily."));
    }

    #[test]
    fn test_html_is_escaped() {
        let html = render_html("R&D <team> said \"hi\"");
        assert!(html.contains("R&amp;D &lt;team&gt; said &quot;hi&quot;"));
    }

    #[test]
    fn test_linkedin_line_becomes_named_link() {
        let html = render_html("Best,\nJane\nLinkedIn: https://www.linkedin.com/in/janedoe/");
        assert!(html.contains(
            r#"<a href="https://www.linkedin.com/in/janedoe/" style="color: #0077B5; text-decoration: none;">LinkedIn</a>"#
        ));
        assert!(!html.contains("LinkedIn: "));
    }

    #[test]
    fn test_bare_url_linked_without_trailing_period() {
        let html = render_html("See https://janedoe.dev.");
        assert!(html.contains(r#"<a href="https://janedoe.dev" style="#));
        assert!(html.contains(">https://janedoe.dev</a>."));
    }

    #[test]
    fn test_bold_url_keeps_link_intact() {
        let html = render_html("My portfolio: **https://janedoe.dev**.");
        assert!(html.contains(
            r#"<strong><a href="https://janedoe.dev" style="color: #0077B5; text-decoration: none;">https://janedoe.dev</a></strong>."#
        ));
        assert!(!html.contains("**"));
    }

    #[test]
    fn test_newlines_become_breaks() {
        let html = render_html("Dear Bob,\n\nHello");
        assert!(html.contains("Dear Bob,<br>\n<br>\nHello"));
        assert!(html.starts_with("<html>\n<body style=\"font-family: Arial"));
    }

    #[test]
    fn test_plain_strips_bold_only() {
        assert_eq!(
            render_plain("Hi **Bob**, see https://x.dev"),
            "Hi Bob, see https://x.dev"
        );
    }
}
