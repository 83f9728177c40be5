//! News ingestion: a catalog of syndicated feeds, a provider that fetches
//! them, and press clippings that carry an item into a conversation.

pub mod rss;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::message::{EntryKind, TranscriptEntry};

pub use rss::{FeedTransport, NewsError, ReqwestFeedTransport, Rss2JsonNewsProvider};

const SNIPPET_MAX_CHARS: usize = 200;
const SNIPPET_KEEP_CHARS: usize = 197;
const EMPTY_SNIPPET: &str = "No summary available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsSource {
    pub name: &'static str,
    pub country: &'static str,
    pub url: &'static str,
}

pub const NEWS_SOURCES: &[NewsSource] = &[
    NewsSource { name: "Clarín", country: "AR", url: "https://www.clarin.com/rss/lo-ultimo/" },
    NewsSource {
        name: "La Nación",
        country: "AR",
        url: "https://www.lanacion.com.ar/arc/outboundfeeds/rss/?outputType=xml",
    },
    NewsSource {
        name: "La Política Online",
        country: "AR",
        url: "https://news.google.com/rss/search?q=site:lapoliticaonline.com&hl=es-419&gl=AR&ceid=AR:es-419",
    },
    NewsSource {
        name: "DataClave",
        country: "AR",
        url: "https://news.google.com/rss/search?q=site:dataclave.com.ar&hl=es-419&gl=AR&ceid=AR:es-419",
    },
    NewsSource {
        name: "La Izquierda Diario",
        country: "AR",
        url: "https://www.laizquierdadiario.com/spip.php?page=backend",
    },
    NewsSource {
        name: "Tiempo Argentino",
        country: "AR",
        url: "https://www.tiempoar.com.ar/articulos/feed",
    },
    NewsSource {
        name: "Folha de S.Paulo",
        country: "BR",
        url: "https://feeds.folha.uol.com.br/mundo/rss091.xml",
    },
    NewsSource { name: "Il Manifesto", country: "IT", url: "https://ilmanifesto.it/feed/" },
    NewsSource {
        name: "Il Fatto Quotidiano",
        country: "IT",
        url: "https://www.ilfattoquotidiano.it/feed/",
    },
    NewsSource {
        name: "Corriere della Sera",
        country: "IT",
        url: "https://xml2.corriereobjects.it/feed-hp/homepage.xml",
    },
    NewsSource {
        name: "Der Spiegel",
        country: "DE",
        url: "https://www.spiegel.de/international/index.rss",
    },
    NewsSource {
        name: "El País",
        country: "ES",
        url: "https://feeds.elpais.com/mrss-s/pages/ep/site/elpais.com/portada",
    },
    NewsSource {
        name: "Le Monde Diplomatique",
        country: "FR",
        url: "https://mondiplo.com/spip.php?page=backend",
    },
    NewsSource { name: "The Guardian", country: "UK", url: "https://www.theguardian.com/world/rss" },
    NewsSource {
        name: "Democracy Now!",
        country: "US",
        url: "https://www.democracynow.org/democracynow.rss",
    },
    NewsSource {
        name: "New York Times",
        country: "US",
        url: "https://rss.nytimes.com/services/xml/rss/nyt/World.xml",
    },
    NewsSource { name: "ProPublica", country: "US", url: "https://feeds.propublica.org/propublica/main" },
];

/// Look a source up by its display name, ignoring ASCII case.
pub fn find_source(name: &str) -> Option<&'static NewsSource> {
    let wanted = name.trim();
    NEWS_SOURCES
        .iter()
        .find(|source| source.name.eq_ignore_ascii_case(wanted))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: String,
    pub date: String,
    pub full_content: String,
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Items for one catalog source, newest first as the feed lists them.
    /// Failures degrade to an empty list.
    async fn fetch_items(&self, source_id: &str) -> Vec<NewsItem>;
}

/// Remove anything that looks like a markup tag.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        match after.find('>') {
            Some(end) if end > 0 => {
                out.push_str(&rest[..start]);
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..=start]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Plain-text teaser for a feed item description.
pub fn clean_snippet(description: &str) -> String {
    let cleaned = strip_tags(description);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return EMPTY_SNIPPET.to_string();
    }
    if cleaned.chars().count() > SNIPPET_MAX_CHARS {
        let mut short: String = cleaned.chars().take(SNIPPET_KEEP_CHARS).collect();
        short.push_str("...");
        return short;
    }
    cleaned.to_string()
}

/// A news item clipped into the transcript as a user entry.
pub fn press_clipping_entry(id: impl Into<String>, item: &NewsItem) -> TranscriptEntry {
    let text = format!(
        "[PRESS FILE]\n\nSOURCE: {}\nHEADLINE: {}\nSUMMARY: {}\nLINK: {}",
        item.source, item.title, item.snippet, item.url
    );
    TranscriptEntry::user(id, text).with_kind(EntryKind::PressClipping)
}

/// Follow-up prompt asking the model to analyze a clipping. `None` for any
/// other kind of entry.
pub fn analysis_prompt(entry: &TranscriptEntry) -> Option<String> {
    entry
        .is_press_clipping()
        .then(|| format!("Analyze and process the following news item:\n\n{}", entry.text))
}
