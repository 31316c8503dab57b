//! Web research: Wikipedia, then DuckDuckGo, then a Bing results scrape.
//!
//! Every source is optional. Network errors and empty answers fall through to
//! the next source, and a miss on all three is simply "no research".

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use anyhow::{Result, anyhow};
use moka::future::Cache;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

use super::Researcher;
use crate::config::ResearchConfig;
use crate::constants::{
    RESEARCH_CACHE_CAPACITY, RESEARCH_SUMMARY_MAX_CHARS, RESEARCH_USER_AGENT, SNIPPET_MIN_CHARS,
    WIKIPEDIA_MIN_EXTRACT_CHARS,
};
use crate::contacts::is_placeholder_company;

const WIKIPEDIA_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";
const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";
const BING_URL: &str = "https://www.bing.com/search";

/// DuckDuckGo and Bing serve reduced pages to unknown agents
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Render width for scraped pages, wide enough that paragraphs stay on one line
const SCRAPE_RENDER_WIDTH: usize = 1_000;

const RELATED_TOPICS: usize = 3;
const RELATED_MAX_CHARS: usize = 300;
const SNIPPET_DESCRIPTION_MAX_CHARS: usize = 400;
const SNIPPET_RELATED_MAX_CHARS: usize = 200;

/// Search-page chrome that mentions the company but says nothing about it
static BOILERPLATE: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(["cookie", "privacy", "sign in", "log in"])
        .expect("valid boilerplate patterns")
});

#[derive(Debug, Clone, Default, PartialEq)]
struct Findings {
    description: String,
    related: String,
}

impl Findings {
    /// Single whitespace-collapsed line, capped for prompt use.
    fn summary(&self) -> String {
        let mut text = self.description.clone();
        if !self.related.is_empty() {
            text.push(' ');
            text.push_str(&self.related);
        }
        truncate_chars(&collapse_whitespace(&text), RESEARCH_SUMMARY_MAX_CHARS)
    }
}

#[derive(Debug, Deserialize)]
struct WikipediaSummary {
    #[serde(default)]
    extract: String,
}

#[derive(Debug, Deserialize)]
struct DuckDuckGoAnswer {
    #[serde(rename = "Abstract", default)]
    abstract_text: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

/// Topic groups carry `Name`/`Topics` instead of `Text` and are skipped
#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: Option<String>,
}

pub struct WebResearcher {
    client: Client,
    enabled: bool,
    /// Keyed by lowercased company; misses are cached too
    cache: Cache<String, Option<String>>,
}

impl WebResearcher {
    pub fn new(config: &ResearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(RESEARCH_USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            enabled: config.enabled,
            cache: Cache::builder()
                .max_capacity(RESEARCH_CACHE_CAPACITY)
                .build(),
        })
    }

    async fn lookup(&self, company: &str) -> Option<Findings> {
        if let Some(findings) = self.wikipedia(company).await {
            return Some(findings);
        }

        match self.duckduckgo(company).await {
            Ok(Some(findings)) => return Some(findings),
            Ok(None) => {}
            Err(e) => tracing::debug!("DuckDuckGo lookup for '{}' failed: {}", company, e),
        }

        match self.bing(company).await {
            Ok(findings) => findings,
            Err(e) => {
                tracing::debug!("Search scrape for '{}' failed: {}", company, e);
                None
            }
        }
    }

    /// Exact title first, then the "(company)" disambiguation page.
    async fn wikipedia(&self, company: &str) -> Option<Findings> {
        for title in [company.to_string(), format!("{} (company)", company)] {
            match self.wikipedia_extract(&title).await {
                Ok(Some(extract)) => {
                    return Some(Findings {
                        description: truncate_chars(&extract, RESEARCH_SUMMARY_MAX_CHARS),
                        related: String::new(),
                    });
                }
                Ok(None) => {}
                Err(e) => tracing::debug!("Wikipedia lookup for '{}' failed: {}", title, e),
            }
        }
        None
    }

    async fn wikipedia_extract(&self, title: &str) -> Result<Option<String>> {
        let mut url = Url::parse(WIKIPEDIA_SUMMARY_URL)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Wikipedia URL cannot take path segments"))?
            .pop_if_empty()
            .push(title);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let summary: WikipediaSummary = response.json().await?;
        Ok(substantial_extract(summary.extract))
    }

    async fn duckduckgo(&self, company: &str) -> Result<Option<Findings>> {
        let query = format!("{} company", company);
        let response = self
            .client
            .get(DUCKDUCKGO_URL)
            .query(&[("q", query.as_str()), ("format", "json"), ("no_html", "1")])
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let answer: DuckDuckGoAnswer = response.json().await?;
        Ok(duckduckgo_findings(answer))
    }

    async fn bing(&self, company: &str) -> Result<Option<Findings>> {
        let query = format!("{} company about us", company);
        let response = self
            .client
            .get(BING_URL)
            .query(&[("q", query.as_str())])
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let html = response.text().await?;
        Ok(snippet_findings(search_snippets(&html, company)))
    }
}

impl Researcher for WebResearcher {
    async fn research(&self, company: &str) -> Option<String> {
        let company = company.trim();
        if !self.enabled || is_placeholder_company(company) {
            return None;
        }

        let key = company.to_lowercase();
        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let summary = self
            .lookup(company)
            .await
            .map(|findings| findings.summary())
            .filter(|summary| !summary.is_empty());
        match &summary {
            Some(_) => tracing::info!("Found research for {}", company),
            None => tracing::info!("No research found for {}", company),
        }

        self.cache.insert(key, summary.clone()).await;
        summary
    }
}

fn substantial_extract(extract: String) -> Option<String> {
    let extract = extract.trim();
    (extract.chars().count() > WIKIPEDIA_MIN_EXTRACT_CHARS).then(|| extract.to_string())
}

fn duckduckgo_findings(answer: DuckDuckGoAnswer) -> Option<Findings> {
    let related: Vec<String> = answer
        .related_topics
        .into_iter()
        .take(RELATED_TOPICS)
        .filter_map(|topic| topic.text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    let abstract_text = answer.abstract_text.trim().to_string();

    let description = if !abstract_text.is_empty() {
        abstract_text
    } else {
        related.first()?.clone()
    };

    Some(Findings {
        description,
        related: truncate_chars(&related.join(" "), RELATED_MAX_CHARS),
    })
}

/// Up to two result snippets that talk about the company.
fn search_snippets(html: &str, company: &str) -> Vec<String> {
    let rendered = html2text::config::plain().string_from_read(html.as_bytes(), SCRAPE_RENDER_WIDTH);
    let text = match rendered {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Could not render search page: {}", e);
            return Vec::new();
        }
    };
    let needle = company.to_lowercase();

    text.lines()
        .map(collapse_whitespace)
        .filter(|line| line.chars().count() > SNIPPET_MIN_CHARS)
        .filter(|line| line.to_lowercase().contains(&needle))
        .filter(|line| !BOILERPLATE.is_match(line))
        .take(2)
        .collect()
}

fn snippet_findings(snippets: Vec<String>) -> Option<Findings> {
    let mut snippets = snippets.into_iter();
    let description = snippets.next()?;
    Some(Findings {
        description: truncate_chars(&description, SNIPPET_DESCRIPTION_MAX_CHARS),
        related: snippets
            .next()
            .map(|s| truncate_chars(&s, SNIPPET_RELATED_MAX_CHARS))
            .unwrap_or_default(),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
