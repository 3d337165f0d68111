//! Sitemap XML parsing
//!
//! Handles both `<urlset>` documents and `<sitemapindex>` documents. Only the
//! local element names are looked at, so namespaced sitemaps parse the same.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

/// Priority assumed when an entry does not carry one
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// One `<url>` entry of a urlset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitemapEntry {
    pub loc: String,
    pub priority: f64,
    pub changefreq: Option<String>,
    pub lastmod: Option<String>,
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq)]
pub enum Sitemap {
    UrlSet(Vec<SitemapEntry>),
    /// Locations of child sitemaps, in document order
    Index(Vec<String>),
}

/// Which child element text is currently being read
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Loc,
    Priority,
    ChangeFreq,
    LastMod,
}

#[derive(Default)]
struct PendingEntry {
    loc: Option<String>,
    priority: Option<String>,
    changefreq: Option<String>,
    lastmod: Option<String>,
}

impl PendingEntry {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Loc => &mut self.loc,
            Field::Priority => &mut self.priority,
            Field::ChangeFreq => &mut self.changefreq,
            Field::LastMod => &mut self.lastmod,
        };
        slot.get_or_insert_with(String::new).push_str(&value);
    }

    /// Entries without a usable absolute `loc` are dropped
    fn finish(self) -> Option<SitemapEntry> {
        let loc = self.loc?.trim().to_string();
        if !(loc.starts_with("http://") || loc.starts_with("https://")) {
            return None;
        }

        let priority = self
            .priority
            .and_then(|p| p.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_PRIORITY);

        Some(SitemapEntry {
            loc,
            priority,
            changefreq: self.changefreq.map(|s| s.trim().to_string()),
            lastmod: self.lastmod.map(|s| s.trim().to_string()),
        })
    }
}

/// Parses sitemap XML
///
/// # Returns
///
/// * `Ok(Sitemap)` - A urlset or a sitemap index
/// * `Err(String)` - The XML is malformed or the root element is neither
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut root: Option<String> = None;
    let mut entries = Vec::new();
    let mut children = Vec::new();
    let mut pending: Option<PendingEntry> = None;
    let mut field: Option<Field> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                depth += 1;
                // Only direct children of <url>/<sitemap> count, so nested
                // extension elements such as <image:loc> are ignored
                field = match (depth, name.as_str()) {
                    (1, _) => {
                        root = Some(name.clone());
                        None
                    }
                    (2, "url" | "sitemap") => {
                        pending = Some(PendingEntry::default());
                        None
                    }
                    (3, "loc") => Some(Field::Loc),
                    (3, "priority") => Some(Field::Priority),
                    (3, "changefreq") => Some(Field::ChangeFreq),
                    (3, "lastmod") => Some(Field::LastMod),
                    _ => None,
                };
            }
            Ok(Event::Text(e)) => {
                if let (Some(entry), Some(f)) = (pending.as_mut(), field) {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    entry.set(f, text.into_owned());
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(entry), Some(f)) = (pending.as_mut(), field) {
                    let bytes = e.into_inner();
                    entry.set(f, String::from_utf8_lossy(&bytes).into_owned());
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                let closing_depth = depth;
                depth = depth.saturating_sub(1);
                match name.as_str() {
                    "url" | "sitemap" if closing_depth == 2 => {
                        if let Some(entry) = pending.take().and_then(PendingEntry::finish) {
                            if name == "url" {
                                entries.push(entry);
                            } else {
                                children.push(entry.loc);
                            }
                        }
                    }
                    _ => field = None,
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("urlset") => Ok(Sitemap::UrlSet(entries)),
        Some("sitemapindex") => Ok(Sitemap::Index(children)),
        Some(other) => Err(format!("unexpected root element <{}>", other)),
        None => Err("empty document".to_string()),
    }
}
