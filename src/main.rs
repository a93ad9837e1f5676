use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use musichandler_rs::commands::App;
use musichandler_rs::logging::{self, DebugLog, LOG_FILE_NAME};
use musichandler_rs::relocate::RelocateMode;
use musichandler_rs::settings::{Settings, CONFIG_ENV};

#[derive(Parser)]
#[command(name = "musichandler_rs", version)]
#[command(about = "Tag, decorate and file away MP3 downloads", long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Directory for the debug log file
    #[arg(long, global = true, env = "MUSICHANDLER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Write debug-level details to the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Embed Discogs artwork into MP3 files
    ///
    /// Every file's artist tag is searched on Discogs and the first artist
    /// image found is embedded as the front cover. The first run asks you to
    /// authorize the application in your browser; the resulting tokens are
    /// stored unencrypted in the settings file.
    Art,

    /// Rewrite artist/title tags from "Artist - Title.mp3" filenames
    ///
    /// Featuring markers are normalized to "ft." in the filename first.
    /// Files that do not follow the convention, or match the invalid
    /// pattern, are moved unchanged into an "_invalid" folder inside the
    /// source directory.
    Id3,

    /// Copy MP3 files into artist folders in the destination
    ///
    /// A file tagged with artist <name> ends up in <destination>/<name>/.
    /// Copying the same file again overwrites the earlier copy.
    Copy,

    /// Move MP3 files into artist folders in the destination
    ///
    /// A file tagged with artist <name> ends up in <destination>/<name>/.
    Move,

    /// Run id3, art and copy, in that order
    All,

    /// Find files modified after a date, then list or copy them
    ///
    /// The default destination directory is searched by default, since that
    /// is where the library lives.
    Uploads,

    /// Set the default source directory
    ///
    /// "~" is expanded and relative paths are stored as absolute ones. A path
    /// that does not exist is accepted here, but commands will ask for
    /// another directory until an existing one is given.
    #[command(alias = "set_source")]
    SetSource {
        /// New default source directory
        path: Option<String>,
    },

    /// Set the default destination directory
    ///
    /// "~" is expanded and relative paths are stored as absolute ones. A path
    /// that does not exist is accepted here, but commands will ask for
    /// another directory until an existing one is given.
    #[command(alias = "set_dest")]
    SetDest {
        /// New default destination directory
        path: Option<String>,
    },

    /// Delete the debug log file
    Clear,

    /// Show where the debug log lives and whether it is enabled
    #[command(alias = "log_info")]
    LogInfo,

    /// Turn debug logging off
    #[command(alias = "log_off")]
    LogOff,

    /// Turn debug logging on
    #[command(alias = "log_on")]
    LogOn,

    /// Print the settings and log file information
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config_path = cli.config.unwrap_or_else(Settings::default_path);
    let (settings, created) =
        Settings::load_or_init(&config_path).context("Failed to load settings")?;

    let log = match cli.log_dir {
        Some(dir) => DebugLog::new(dir, LOG_FILE_NAME),
        None => DebugLog::default_location(),
    };
    if !settings.logging {
        log.disable();
    }
    logging::init_tracing(&log, cli.verbose)?;

    if created {
        info!("Created default settings at {}", config_path.display());
        println!(
            "{} Created default settings at {}",
            "✓".bright_green(),
            config_path.display().to_string().bright_cyan()
        );
    }
    info!("Successfully loaded settings.");

    let mut app = App::new(settings, log);

    match command {
        Command::Art => {
            info!("art called.");
            app.art(None).await?;
        }
        Command::Id3 => {
            info!("id3 called.");
            app.id3(None)?;
        }
        Command::Copy => {
            info!("copy called.");
            app.relocate(None, RelocateMode::Copy)?;
        }
        Command::Move => {
            info!("move called.");
            app.relocate(None, RelocateMode::Move)?;
        }
        Command::All => {
            info!("all called.");
            app.all().await?;
        }
        Command::Uploads => {
            info!("uploads called.");
            app.uploads()?;
        }
        Command::SetSource { path } => match path {
            Some(path) => {
                info!("set-source called with path: {}", path);
                app.set_source(&path)?;
            }
            None => print_subcommand_help("set-source")?,
        },
        Command::SetDest { path } => match path {
            Some(path) => {
                info!("set-dest called with path: {}", path);
                app.set_destination(&path)?;
            }
            None => print_subcommand_help("set-dest")?,
        },
        Command::Clear => {
            app.clear_log()?;
            return Ok(());
        }
        Command::LogInfo => {
            info!("log-info called.");
            app.log_info();
        }
        Command::LogOff => {
            info!("log-off called.");
            app.log_off()?;
        }
        Command::LogOn => {
            app.log_on()?;
            info!("log-on called.");
        }
        Command::Settings => {
            info!("settings called.");
            app.show_settings();
        }
    }

    info!("Exiting: 0");
    Ok(())
}

fn print_subcommand_help(name: &str) -> Result<()> {
    let mut cli = Cli::command();
    match cli.find_subcommand_mut(name) {
        Some(sub) => sub.print_long_help()?,
        None => cli.print_help()?,
    }
    Ok(())
}
