#[cfg(test)]
mod tests;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use scraper::Html;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::Document;
use crate::http::HttpClient;
use crate::{RagError, Result};

/// One headline from an RSS or Atom feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Summary,
}

#[inline]
pub fn fetch_feed(http: &HttpClient, url: &Url, limit: usize) -> Result<Vec<FeedItem>> {
    let body = http
        .get_text(url)
        .map_err(|e| RagError::Load(format!("failed to fetch feed {url}: {e:#}")))?;
    let items = parse_feed(&body, limit)?;
    debug!("Parsed {} item(s) from {}", items.len(), url);
    Ok(items)
}

/// Parse RSS 2.0 `<item>` or Atom `<entry>` elements, keeping at most `limit`
#[inline]
pub fn parse_feed(xml: &str, limit: usize) -> Result<Vec<FeedItem>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;
    let mut is_feed = false;

    while items.len() < limit {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"rss" | b"feed" | b"RDF" => is_feed = true,
                b"item" | b"entry" => current = Some(FeedItem::default()),
                b"title" if current.is_some() => field = Some(Field::Title),
                b"link" => {
                    if let Some(item) = current.as_mut() {
                        field = Some(Field::Link);
                        if let Some(href) = href_attribute(&e)? {
                            item.link = href;
                        }
                    }
                }
                b"description" | b"summary" | b"content" | b"encoded" => {
                    if current.as_ref().is_some_and(|item| item.summary.is_empty()) {
                        field = Some(Field::Summary);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(item) = current.as_mut().filter(|item| item.link.is_empty()) {
                        item.link = href_attribute(&e)?.unwrap_or_default();
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    let text = text
                        .unescape()
                        .map_err(|e| RagError::Load(format!("malformed feed text: {e}")))?;
                    append(item, field, &text);
                }
            }
            Ok(Event::CData(data)) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    append(item, field, &String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(item) = current.take() {
                        items.push(finish(item));
                    }
                }
                b"title" | b"link" | b"description" | b"summary" | b"content" | b"encoded" => {
                    field = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RagError::Load(format!(
                    "malformed feed at byte {}: {e}",
                    reader.error_position()
                )));
            }
            Ok(_) => {}
        }
    }

    if !is_feed && limit > 0 {
        return Err(RagError::Load("not an RSS or Atom feed".to_string()));
    }

    Ok(items)
}

/// Render feed items as a single document, one block per item
#[inline]
pub fn items_to_document(url: &Url, items: &[FeedItem]) -> Document {
    let text = items
        .iter()
        .map(|item| {
            format!(
                "Title: {}\nLink: {}\nSummary: {}",
                item.title, item.link, item.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    Document::new(text, url.as_str())
}

fn href_attribute(element: &BytesStart<'_>) -> Result<Option<String>> {
    let attribute = element
        .try_get_attribute("href")
        .map_err(|e| RagError::Load(format!("malformed feed attribute: {e}")))?;
    attribute
        .map(|attr| {
            attr.unescape_value()
                .map(|value| value.into_owned())
                .map_err(|e| RagError::Load(format!("malformed feed attribute: {e}")))
        })
        .transpose()
}

fn append(item: &mut FeedItem, field: Field, text: &str) {
    let target = match field {
        Field::Title => &mut item.title,
        Field::Link => &mut item.link,
        Field::Summary => &mut item.summary,
    };
    target.push_str(text);
}

fn finish(item: FeedItem) -> FeedItem {
    FeedItem {
        title: item.title.trim().to_string(),
        link: item.link.trim().to_string(),
        summary: html_to_text(&item.summary),
    }
}

/// Plain text of a description that may embed HTML markup and entities
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<String>();
    // Non-breaking spaces are content, only ASCII whitespace collapses.
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}
