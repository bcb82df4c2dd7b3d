//! Web page fetching and text extraction for URL intake.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("trident-rag/0.1")
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = url::Url::parse(url).map_err(|e| anyhow!("Invalid URL {}: {}", url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("Unsupported URL scheme: {}", parsed.scheme()));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch {}: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Fetch of {} returned HTTP {}", url, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read body of {}: {}", url, e))?;

        let (title, text) = parse_html(&body);
        Ok(FetchedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Pull the title and visible text out of an HTML document, skipping
/// non-content elements and collapsing whitespace.
pub fn parse_html(body: &str) -> (Option<String>, String) {
    let document = Html::parse_document(body);

    let title = Selector::parse("title").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let body_selector = Selector::parse("body").ok();
    let text = body_selector
        .and_then(|sel| document.select(&sel).next().map(|el| visible_text(&el)))
        .unwrap_or_else(|| {
            document
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ")
        });

    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (title, cleaned)
}

fn visible_text(element: &scraper::ElementRef<'_>) -> String {
    const SKIP: [&str; 7] = [
        "script", "style", "noscript", "nav", "header", "footer", "aside",
    ];

    let mut out = String::new();
    collect_text(element, &SKIP, &mut out);
    out
}

fn collect_text(element: &scraper::ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in element.children() {
        match child.value() {
            scraper::node::Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            scraper::node::Node::Element(el) => {
                if skip.contains(&el.name()) {
                    continue;
                }
                if let Some(child_ref) = scraper::ElementRef::wrap(child) {
                    collect_text(&child_ref, skip, out);
                }
            }
            _ => {}
        }
    }
}
