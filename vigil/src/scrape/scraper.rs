use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::error::{Result, VigilError};

/// Tags whose entire subtree is boilerplate, never page content.
const STRIP_TAGS: [&str; 9] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "iframe", "svg",
];

/// Extracted page content plus whatever metadata the markup exposed.
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub text: String,
}

pub struct WebScraper {
    client: reqwest::Client,
    max_body_bytes: u64,
}

impl WebScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Fetch a URL and reduce it to readable text. Any failure along the
    /// way (network, unsupported content type, oversized body) comes back
    /// as a `ScrapeFailed` so callers can treat pages uniformly.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        let fail = |reason: String| VigilError::ScrapeFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let is_html = content_type.contains("text/html") || content_type.contains("application/xhtml");
        let is_plain = content_type.contains("text/plain");
        if !is_html && !is_plain {
            return Err(fail(format!("unsupported content type '{content_type}'")));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_body_bytes {
                return Err(fail(format!(
                    "declared body size {declared} exceeds limit {}",
                    self.max_body_bytes
                )));
            }
        }

        // Content-Length is advisory; enforce the cap while reading too.
        let mut body: Vec<u8> = Vec::new();
        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fail(format!("read failed: {e}")))?
        {
            if body.len() as u64 + chunk.len() as u64 > self.max_body_bytes {
                return Err(fail(format!("body exceeds limit {}", self.max_body_bytes)));
            }
            body.extend_from_slice(&chunk);
        }

        let raw = String::from_utf8_lossy(&body);

        let page = if is_html {
            extract_from_html(url, &raw)
        } else {
            ScrapedPage {
                url: url.to_string(),
                title: None,
                author: None,
                published_at: None,
                text: normalize_whitespace(&raw),
            }
        };

        if page.text.is_empty() {
            return Err(fail("no text content after extraction".to_string()));
        }

        Ok(page)
    }
}

fn extract_from_html(url: &str, html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);

    ScrapedPage {
        url: url.to_string(),
        title: extract_title(&document),
        author: meta_content(&document, "meta[name=\"author\"]"),
        published_at: meta_content(&document, "meta[property=\"article:published_time\"]")
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        text: extract_text(&document),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_text(document: &Html) -> String {
    let body_selector = Selector::parse("body").ok();
    let article_selector = Selector::parse("article, main, .content, #content").ok();

    let content_root = article_selector
        .as_ref()
        .and_then(|s| document.select(s).next())
        .or_else(|| {
            body_selector
                .as_ref()
                .and_then(|s| document.select(s).next())
        });

    let Some(root) = content_root else {
        return normalize_whitespace(&document.root_element().text().collect::<String>());
    };

    let mut text = String::new();
    collect_text(*root, &mut text);
    normalize_whitespace(&text)
}

/// Walk the subtree, dropping boilerplate elements and their children.
fn collect_text(node: ego_tree::NodeRef<'_, scraper::Node>, out: &mut String) {
    if let Some(element) = node.value().as_element() {
        if STRIP_TAGS.contains(&element.name()) {
            return;
        }
    }

    if let Some(text_node) = node.value().as_text() {
        let content = text_node.trim();
        if !content.is_empty() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            out.push_str(content);
        }
    }

    for child in node.children() {
        collect_text(child, out);
    }
}

fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_whitespace = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_was_whitespace {
                result.push(' ');
                prev_was_whitespace = true;
            }
        } else {
            result.push(c);
            prev_was_whitespace = false;
        }
    }

    result.trim().to_string()
}
