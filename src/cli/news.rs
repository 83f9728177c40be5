//! Press desk: browse feed items and send one to the model for analysis.

use std::error::Error;
use std::path::PathBuf;

use crate::cli::context;
use crate::cli::say::{finish, stream_turn};
use crate::core::chat::SendRequest;
use crate::core::config::Config;
use crate::news::{
    analysis_prompt, press_clipping_entry, NewsItem, NewsProvider, ReqwestFeedTransport,
    Rss2JsonNewsProvider, NEWS_SOURCES,
};
use crate::utils::logging::TranscriptLog;

pub struct NewsOptions {
    pub source: Option<String>,
    pub analyze: Option<usize>,
    pub model: Option<String>,
    pub log: Option<PathBuf>,
}

pub async fn run_news(options: NewsOptions) -> Result<(), Box<dyn Error>> {
    let Some(source) = options.source else {
        print_catalog();
        return Ok(());
    };

    let provider = Rss2JsonNewsProvider::new(Box::new(ReqwestFeedTransport::new(
        reqwest::Client::builder().build()?,
    )));
    let items = provider.fetch_items(&source).await;
    if items.is_empty() {
        println!("No items available from {source}.");
        return Ok(());
    }

    let Some(number) = options.analyze else {
        print_items(&items);
        return Ok(());
    };
    let Some(item) = number.checked_sub(1).and_then(|index| items.get(index)) else {
        eprintln!("❌ No item {number}; {source} has {} items", items.len());
        std::process::exit(1);
    };

    let config = Config::load()?;
    let chat = context::chat_service(&config, options.model.as_deref())?;
    let log = TranscriptLog::new(options.log)?;

    let clipping_id = chat.append_entry(|id| press_clipping_entry(id, item));
    let Some(prompt) = chat
        .transcript()
        .entry(&clipping_id)
        .as_ref()
        .and_then(analysis_prompt)
    else {
        return Err("press clipping was not recorded".into());
    };
    println!("📡 {}\n", item.title);

    let outcome = stream_turn(&chat, SendRequest::text(prompt), config.markdown_enabled(), &log).await?;
    finish(outcome)
}

fn print_catalog() {
    println!("Available sources:");
    for source in NEWS_SOURCES {
        println!("  [{}] {}", source.country, source.name);
    }
    println!();
    println!("Run `mande news \"<source>\"` to list its latest items.");
}

fn print_items(items: &[NewsItem]) {
    for (index, item) in items.iter().enumerate() {
        println!("{:>2}. {}", index + 1, item.title);
        if !item.date.is_empty() {
            println!("    {}", item.date);
        }
        println!("    {}", item.snippet);
        println!("    {}", item.url);
    }
}
