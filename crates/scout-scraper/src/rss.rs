//! Minimal RSS item reader.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ScraperError;

/// One `<item>` with its direct child elements keyed by qualified tag name
/// (e.g. `title`, `link`, `ht:approx_traffic`). Text and CDATA are kept raw,
/// so HTML descriptions can be parsed further by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    fields: HashMap<String, String>,
}

impl FeedItem {
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields
            .get(tag)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get("title")
    }

    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.get("link")
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.get("description")
    }
}

/// Parse an RSS document into items, stopping after `max_items`.
///
/// # Errors
///
/// Returns [`ScraperError::Xml`] if the document is not well-formed.
pub fn parse_feed(xml: &str, max_items: usize) -> Result<Vec<FeedItem>, ScraperError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    // Child tag of <item> currently open; nested markup inside it is flattened.
    let mut field: Option<String> = None;
    let mut depth_in_field = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    current = Some(FeedItem::default());
                    field = None;
                } else if current.is_some() {
                    if field.is_none() {
                        field = Some(name);
                        depth_in_field = 0;
                    } else {
                        depth_in_field += 1;
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                        if items.len() >= max_items {
                            break;
                        }
                    }
                    field = None;
                } else if field.is_some() {
                    if depth_in_field == 0 {
                        field = None;
                    } else {
                        depth_in_field -= 1;
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(item), Some(tag)) = (current.as_mut(), field.as_ref()) {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(err) => {
                            tracing::debug!(field = %tag, error = %err, "rss: keeping raw text with unknown entity");
                            String::from_utf8_lossy(e.as_ref()).into_owned()
                        }
                    };
                    append(item, tag, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(item), Some(tag)) = (current.as_mut(), field.as_ref()) {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    append(item, tag, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScraperError::Xml(e)),
            _ => {}
        }
    }

    Ok(items)
}

fn append(item: &mut FeedItem, tag: &str, text: &str) {
    let entry = item.fields.entry(tag.to_string()).or_default();
    if !entry.is_empty() {
        entry.push(' ');
    }
    entry.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:ht="https://trends.google.com/trends/trendingsearches/daily">
  <channel>
    <title>Bestsellers</title>
    <item>
      <title>#1: Mini Portable Blender</title>
      <link>https://www.amazon.com/dp/B0BLEND001</link>
      <description><![CDATA[<img src="https://m.media-amazon.com/images/I/blender.jpg"/> <b>$29.99</b>]]></description>
      <ht:approx_traffic>200,000+</ht:approx_traffic>
    </item>
    <item>
      <title>Sunset &amp; Lamp</title>
      <link>https://www.amazon.com/dp/B0LAMP0002</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_namespaced_fields() {
        let items = parse_feed(FEED, 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title(), Some("#1: Mini Portable Blender"));
        assert_eq!(items[0].get("ht:approx_traffic"), Some("200,000+"));
        assert!(items[0].description().unwrap().contains("blender.jpg"));
        assert_eq!(items[1].title(), Some("Sunset & Lamp"));
    }

    #[test]
    fn channel_title_is_not_an_item_field() {
        let items = parse_feed(FEED, 10).unwrap();
        assert!(items.iter().all(|i| i.title() != Some("Bestsellers")));
    }

    #[test]
    fn unknown_entity_keeps_raw_title() {
        let feed = r#"<rss><channel><item>
            <title>Glow&reg; Sunset Lamp</title>
            <link>https://www.amazon.com/dp/B0LAMP0003</link>
        </item></channel></rss>"#;
        let items = parse_feed(feed, 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title(), Some("Glow&reg; Sunset Lamp"));
    }

    #[test]
    fn stops_at_max_items() {
        let items = parse_feed(FEED, 1).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let result = parse_feed("<rss><channel><item><title>x</wrong></item>", 10);
        assert!(matches!(result, Err(ScraperError::Xml(_))));
    }
}
