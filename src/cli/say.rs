//! TUI-less "say" command

use std::error::Error;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::cli::context;
use crate::core::chat::{ChatService, SendOutcome, SendRequest};
use crate::core::chat_stream::TurnOutcome;
use crate::core::config::Config;
use crate::core::message::{ImagePayload, Role};
use crate::core::transcript::TranscriptHandle;
use crate::ui::ansi::{write_plain, write_styled};
use crate::ui::render::render_markdown;
use crate::ui::theme::Theme;
use crate::utils::logging::TranscriptLog;

pub struct SayOptions {
    pub prompt: Vec<String>,
    pub session: Option<String>,
    pub image: Option<PathBuf>,
    pub model: Option<String>,
    pub log: Option<PathBuf>,
}

pub async fn run_say(options: SayOptions) -> Result<(), Box<dyn Error>> {
    let prompt = options.prompt.join(" ");
    let attachment = options.image.as_deref().map(load_image).transpose()?;
    if prompt.trim().is_empty() && attachment.is_none() {
        eprintln!("Usage: mande say <prompt>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let chat = context::chat_service(&config, options.model.as_deref())?;
    if let Some(id) = &options.session {
        if !chat.load_session(id).await? {
            eprintln!("❌ Unknown session: {id}");
            std::process::exit(1);
        }
    }
    let log = TranscriptLog::new(options.log)?;

    let mut request = SendRequest::text(prompt);
    if let Some(image) = attachment {
        request = request.with_attachment(image);
    }

    let outcome = stream_turn(&chat, request, config.markdown_enabled(), &log).await?;
    finish(outcome)
}

/// Read an image file for attaching to a prompt.
pub fn load_image(path: &Path) -> Result<ImagePayload, Box<dyn Error>> {
    let data = std::fs::read(path)
        .map_err(|err| format!("Failed to read image {}: {err}", path.display()))?;
    let mime_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    };
    Ok(ImagePayload::new(mime_type, data))
}

/// Send one turn and show the answer. Plain mode prints text as it streams;
/// markdown mode renders the finished answer.
pub async fn stream_turn(
    chat: &ChatService,
    request: SendRequest,
    markdown: bool,
    log: &TranscriptLog,
) -> Result<SendOutcome, Box<dyn Error>> {
    let transcript = chat.transcript();
    let baseline = transcript.read(|store| store.len());
    let cancel = CancellationToken::new();
    let done = CancellationToken::new();

    let interrupt = {
        let cancel = cancel.clone();
        let done = done.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => cancel.cancel(),
                _ = done.cancelled() => {}
            }
        }
    };
    let send = async {
        let outcome = chat.send_with_cancel(request, &cancel).await;
        done.cancel();
        outcome
    };
    let printer = async {
        if markdown {
            done.cancelled().await;
            Ok(())
        } else {
            echo_stream(transcript, baseline, &done).await
        }
    };

    let (outcome, printed, ()) = tokio::join!(send, printer, interrupt);
    printed?;

    let new_entries: Vec<_> = transcript
        .snapshot()
        .into_iter()
        .skip(baseline)
        .collect();
    for entry in &new_entries {
        log.log_entry(entry)?;
    }

    let mut stdout = io::stdout();
    for entry in new_entries.iter().filter(|entry| entry.role == Role::Model) {
        if markdown {
            let styled = stdout.is_terminal();
            let theme = if styled {
                Theme::dark_default()
            } else {
                Theme::monochrome()
            };
            let lines = render_markdown(&entry.text, &theme);
            if styled {
                write_styled(&mut stdout, &lines)?;
            } else {
                write_plain(&mut stdout, &lines)?;
            }
        }
        for source in entry
            .grounding
            .web_sources
            .iter()
            .chain(&entry.grounding.map_sources)
        {
            println!("  ↳ {} <{}>", source.title, source.uri);
        }
        if !entry.images.is_empty() {
            println!("  ({} image(s) returned; use `mande image` to save them)", entry.images.len());
        }
    }
    Ok(outcome)
}

// Print the growing model entry as its text arrives.
async fn echo_stream(
    transcript: &TranscriptHandle,
    baseline: usize,
    done: &CancellationToken,
) -> Result<(), Box<dyn Error>> {
    let mut revisions = transcript.subscribe();
    let mut printed = 0;
    let mut stdout = io::stdout();

    loop {
        let finished = done.is_cancelled();
        let delta = transcript.read(|store| {
            store
                .entries()
                .iter()
                .skip(baseline)
                .find(|entry| entry.role == Role::Model)
                .and_then(|entry| entry.text.get(printed..).map(str::to_string))
        });
        if let Some(delta) = delta.filter(|delta| !delta.is_empty()) {
            printed += delta.len();
            write!(stdout, "{delta}")?;
            stdout.flush()?;
        }
        if finished {
            break;
        }
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = done.cancelled() => {}
        }
    }

    if printed > 0 {
        writeln!(stdout)?;
    }
    Ok(())
}

/// Exit status for a finished turn.
pub fn finish(outcome: SendOutcome) -> Result<(), Box<dyn Error>> {
    match outcome {
        SendOutcome::Completed(TurnOutcome::Finalized { .. }) => Ok(()),
        SendOutcome::Completed(TurnOutcome::Abandoned { .. }) => {
            eprintln!("⚠️  Interrupted");
            std::process::exit(130);
        }
        SendOutcome::Completed(TurnOutcome::Failed { message, .. })
        | SendOutcome::Completed(TurnOutcome::ConnectionFailed { message, .. }) => {
            eprintln!("❌ Error: {message}");
            std::process::exit(1);
        }
        SendOutcome::Rejected => {
            eprintln!("❌ Nothing to send");
            std::process::exit(1);
        }
    }
}
