//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod auth;
pub mod context;
pub mod image;
pub mod news;
pub mod render;
pub mod say;
pub mod sessions;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::auth::{run_auth, run_deauth};
use crate::cli::image::{run_image, ImageOptions};
use crate::cli::news::{run_news, NewsOptions};
use crate::cli::render::run_render;
use crate::cli::say::{run_say, SayOptions};
use crate::cli::sessions::{delete_session, list_sessions, open_store, show_session};
use crate::core::config::settings::KEYS;
use crate::core::config::{path_display, AspectRatio, Config, ImageSize};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser)]
#[command(name = "mande")]
#[command(version = VERSION)]
#[command(about = "A terminal client for the Gemini API")]
#[command(
    long_about = "Mande streams Gemini answers to the terminal with web and map grounding, \
generates and edits images, and clips news items from a built-in set of RSS feeds for analysis.\n\n\
Authentication:\n\
  Use 'mande auth' to store your API key in the system keyring.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    API key (takes precedence over the keyring)\n\
  API_KEY           Fallback API key variable\n\
  MANDE_LOG         Diagnostic log filter, e.g. 'debug' (written to stderr)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Model to use for chat instead of the configured one
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one prompt and stream the answer to stdout
    Say {
        /// Prompt text (can be multiple words)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Continue a saved session
        #[arg(short = 's', long, value_name = "ID")]
        session: Option<String>,
        /// Attach an image; prompts mentioning "edit" are sent to the image model
        #[arg(short = 'i', long, value_name = "FILE")]
        image: Option<PathBuf>,
    },
    /// Generate an image, or edit one with --edit
    Image {
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Source image to edit
        #[arg(short = 'e', long, value_name = "FILE")]
        edit: Option<PathBuf>,
        /// Directory to save images into
        #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
        /// One of 1:1, 16:9, 9:16, 4:3, 3:4
        #[arg(long, value_name = "RATIO")]
        aspect_ratio: Option<AspectRatio>,
        /// One of 1K, 2K, 4K
        #[arg(long, value_name = "SIZE")]
        size: Option<ImageSize>,
    },
    /// List news sources, list a source's items, or analyze one item
    News {
        /// Source name as shown in the catalog
        source: Option<String>,
        /// Clip item N and ask the model to analyze it
        #[arg(short = 'a', long, value_name = "N")]
        analyze: Option<usize>,
    },
    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Render a markdown file (or stdin) the way answers are shown
    Render {
        file: Option<PathBuf>,
        /// dark, light or plain
        #[arg(short = 't', long, default_value = "dark")]
        theme: String,
        /// No colors or escape sequences
        #[arg(long)]
        plain: bool,
    },
    /// Store the API key in the system keyring
    Auth,
    /// Remove the API key from the system keyring
    Deauth,
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List saved sessions, newest first
    List,
    /// Print a saved session
    Show { id: String },
    /// Delete a saved session
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        key: String,
        /// Value to set (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Reset a configuration value to its default
    Unset { key: String },
    /// Print the configuration file location
    Path,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = Config::load().unwrap_or_else(|err| {
        eprintln!("⚠️  Ignoring unreadable configuration: {err}");
        Config::default()
    });
    crate::logging::init(config.log_level.as_deref());

    let runtime = tokio::runtime::Runtime::new()?;
    if let Err(err) = runtime.block_on(async_main(args, config)) {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn async_main(args: Args, config: Config) -> Result<(), Box<dyn Error>> {
    match args.command {
        Commands::Say {
            prompt,
            session,
            image,
        } => {
            run_say(SayOptions {
                prompt,
                session,
                image,
                model: args.model,
                log: args.log,
            })
            .await
        }
        Commands::Image {
            prompt,
            edit,
            out,
            aspect_ratio,
            size,
        } => {
            run_image(ImageOptions {
                prompt,
                edit,
                out_dir: out,
                aspect_ratio,
                size,
            })
            .await
        }
        Commands::News { source, analyze } => {
            run_news(NewsOptions {
                source,
                analyze,
                model: args.model,
                log: args.log,
            })
            .await
        }
        Commands::Sessions { command } => {
            let store = open_store(&config)?;
            match command {
                SessionCommands::List => list_sessions(store.as_ref()).await,
                SessionCommands::Show { id } => {
                    show_session(store.as_ref(), &id, config.markdown_enabled()).await
                }
                SessionCommands::Delete { id } => delete_session(store.as_ref(), &id).await,
            }
        }
        Commands::Render { file, theme, plain } => run_render(file, &theme, plain),
        Commands::Auth => run_auth(),
        Commands::Deauth => run_deauth(),
        Commands::Config { command } => run_config(config, command),
    }
}

fn run_config(mut config: Config, command: Option<ConfigCommands>) -> Result<(), Box<dyn Error>> {
    match command {
        None => {
            config.print_all();
            Ok(())
        }
        Some(ConfigCommands::Path) => {
            println!("{}", path_display(Config::get_config_path()?));
            Ok(())
        }
        Some(ConfigCommands::Set { key, value }) => {
            if value.is_empty() {
                eprintln!("Usage: mande config set <key> <value>");
                eprintln!("Keys: {}", KEYS.join(", "));
                std::process::exit(1);
            }
            let value = value.join(" ");
            config.set(&key, &value)?;
            config.save()?;
            println!("✅ Set {key} to: {value}");
            Ok(())
        }
        Some(ConfigCommands::Unset { key }) => {
            config.unset(&key)?;
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
    }
}
