//! Saved session listing, display and removal.

use std::error::Error;
use std::io::{self, IsTerminal};

use chrono::{Local, TimeZone};

use crate::cli::context;
use crate::core::config::Config;
use crate::core::session::{Session, SessionStore};
use crate::ui::ansi::{write_plain, write_styled};
use crate::ui::render::render_entry;
use crate::ui::theme::Theme;

pub async fn list_sessions(store: &dyn SessionStore) -> Result<(), Box<dyn Error>> {
    let sessions = store.list().await?;
    if sessions.is_empty() {
        println!("No saved sessions.");
        return Ok(());
    }
    for session in &sessions {
        println!("{}", summary_line(session));
    }
    Ok(())
}

pub fn summary_line(session: &Session) -> String {
    let updated = Local
        .timestamp_millis_opt(session.updated_at)
        .single()
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{}  {}  {}", session.id, updated, session.title)
}

pub async fn show_session(store: &dyn SessionStore, id: &str, markdown: bool) -> Result<(), Box<dyn Error>> {
    let Some(session) = store.get(id).await? else {
        eprintln!("❌ Unknown session: {id}");
        std::process::exit(1);
    };

    let mut stdout = io::stdout();
    let styled = stdout.is_terminal();
    let theme = if styled {
        Theme::dark_default()
    } else {
        Theme::monochrome()
    };
    println!("{}\n", session.title);
    for entry in session.entries.iter().filter(|entry| !entry.hidden) {
        let mut lines = render_entry(entry, &theme, markdown);
        lines.push(Default::default());
        if styled {
            write_styled(&mut stdout, &lines)?;
        } else {
            write_plain(&mut stdout, &lines)?;
        }
    }
    Ok(())
}

pub async fn delete_session(store: &dyn SessionStore, id: &str) -> Result<(), Box<dyn Error>> {
    if store.delete(id).await? {
        println!("✅ Deleted session {id}");
        Ok(())
    } else {
        eprintln!("❌ Unknown session: {id}");
        std::process::exit(1);
    }
}

pub fn open_store(config: &Config) -> Result<std::sync::Arc<dyn SessionStore>, Box<dyn Error>> {
    Ok(context::session_store(config)?)
}
