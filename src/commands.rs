// src/commands.rs
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::artwork::{
    self, AccessToken, ConsumerCredentials, DiscogsClient, DiscogsEndpoints, RequestToken,
};
use crate::finder;
use crate::logging::DebugLog;
use crate::progress::Progress;
use crate::prompt;
use crate::relocate::{self, RelocateMode};
use crate::settings::Settings;
use crate::tagger;
use crate::uploads;

/// Loaded settings plus the debug log, shared by every command.
pub struct App {
    pub settings: Settings,
    pub log: DebugLog,
    discogs: DiscogsEndpoints,
}

/// Files selected by one step and handed on to the next.
#[derive(Debug, Clone)]
pub struct Batch {
    pub source: PathBuf,
    pub files: Vec<PathBuf>,
}

impl App {
    pub fn new(settings: Settings, log: DebugLog) -> Self {
        Self {
            settings,
            log,
            discogs: DiscogsEndpoints::default(),
        }
    }

    pub fn with_discogs_endpoints(mut self, endpoints: DiscogsEndpoints) -> Self {
        self.discogs = endpoints;
        self
    }

    fn select_batch(&self) -> Result<Batch> {
        let source = prompt::directory("source", &self.settings.source)?;
        let depth = prompt::recursion_depth()?;
        let files = finder::find_mp3_files(&source, depth)?;

        info!("Source: {}.", source.display());
        info!("{} files found.", files.len());
        println!("{} files found.", files.len().to_string().bright_white());

        Ok(Batch { source, files })
    }

    fn batch_or_prompt(&self, batch: Option<Batch>) -> Result<Batch> {
        match batch {
            Some(batch) => Ok(batch),
            None => self.select_batch(),
        }
    }

    pub fn id3(&mut self, batch: Option<Batch>) -> Result<Batch> {
        let batch = self.batch_or_prompt(batch)?;
        let patterns = self.settings.patterns()?;

        println!("{}", "Preparing for id3 writing ...".bright_yellow());
        let mut progress = progress_bar(batch.files.len(), "id3");
        let report = tagger::correct_tags(&batch.files, &batch.source, &patterns, &mut progress)?;

        println!(
            "{} Tagged {} file(s), {} moved to {}, {} failed.",
            "✓".bright_green(),
            report.tagged.len(),
            report.quarantined.len(),
            tagger::QUARANTINE_DIR,
            report.failed.len()
        );

        Ok(Batch {
            source: batch.source,
            files: report.tagged,
        })
    }

    pub async fn art(&mut self, batch: Option<Batch>) -> Result<Batch> {
        let client = self.authenticate().await?;
        let batch = self.batch_or_prompt(batch)?;
        let patterns = self.settings.patterns()?;

        println!("{}", "Preparing for file image writing ...".bright_yellow());
        let mut progress = progress_bar(batch.files.len(), "art");
        let report = artwork::fetch_artwork(&client, &batch.files, &patterns, &mut progress).await;

        println!(
            "{} Artwork embedded in {} file(s), {} without image, {} failed.",
            "✓".bright_green(),
            report.embedded.len(),
            report.missing.len(),
            report.failed.len()
        );

        Ok(batch)
    }

    pub fn relocate(&mut self, batch: Option<Batch>, mode: RelocateMode) -> Result<Batch> {
        let batch = self.batch_or_prompt(batch)?;
        let destination = prompt::directory("destination", &self.settings.destination)?;
        info!("Destination: {}.", destination.display());

        let step = match mode {
            RelocateMode::Copy => "copy",
            RelocateMode::Move => "move",
        };
        let mut progress = progress_bar(batch.files.len(), step);
        let report = relocate::relocate(&batch.files, &destination, mode, &mut progress);

        println!(
            "{} {} {} file(s) into {}, {} failed.",
            "✓".bright_green(),
            match mode {
                RelocateMode::Copy => "Copied",
                RelocateMode::Move => "Moved",
            },
            report.relocated.len(),
            destination.display(),
            report.failed.len()
        );

        Ok(batch)
    }

    /// id3, then art, then copy, each step working on what the previous kept.
    pub async fn all(&mut self) -> Result<()> {
        info!("id3 internally called.");
        let batch = self.id3(None)?;
        info!("art internally called.");
        let batch = self.art(Some(batch)).await?;
        info!("copy internally called.");
        self.relocate(Some(batch), RelocateMode::Copy)?;
        Ok(())
    }

    pub fn uploads(&mut self) -> Result<Vec<PathBuf>> {
        // Uploads are looked for in the library, not in the download folder
        let source = prompt::directory("source", &self.settings.destination)?;
        info!("Source: {}.", source.display());

        let date = prompt::date()?;
        info!("Date entered: {}", date.format(uploads::DATE_FORMAT));

        let all = finder::find_mp3_files(&source, None)?;
        let files = uploads::modified_after(&all, date);
        info!("{} files found.", files.len());
        println!("{} files found.", files.len().to_string().bright_white());

        let copy = prompt::confirm("Copy files instead of printing to terminal?")?;
        info!("Print to terminal: {}", !copy);

        if copy {
            let destination = prompt::required_directory("Please provide a destination directory")?;
            info!("Destination: {}", destination.display());
            println!("{}", "Preparing to copy files ...".bright_yellow());

            let mut progress = progress_bar(files.len(), "copy");
            let report = relocate::relocate(&files, &destination, RelocateMode::Copy, &mut progress);
            println!(
                "{} Copied {} file(s), {} failed.",
                "✓".bright_green(),
                report.relocated.len(),
                report.failed.len()
            );
        } else {
            println!("In source: {}", source.display().to_string().bright_cyan());
            for file in &files {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                println!("  - {}", name);
            }
        }

        info!("find_uploads completed with {} files.", files.len());
        Ok(files)
    }

    pub fn set_source(&mut self, raw: &str) -> Result<()> {
        let path = self.settings.set_source(raw)?;
        info!("Default source set to: {}", path.display());
        println!("Default source set to: {}", path.display().to_string().bright_cyan());
        Ok(())
    }

    pub fn set_destination(&mut self, raw: &str) -> Result<()> {
        let path = self.settings.set_destination(raw)?;
        info!("Default destination set to: {}", path.display());
        println!(
            "Default destination set to: {}",
            path.display().to_string().bright_cyan()
        );
        Ok(())
    }

    pub fn clear_log(&self) -> Result<()> {
        self.log.clear()?;
        println!("Log file deleted: {}", self.log.path().display());
        Ok(())
    }

    pub fn log_info(&self) {
        println!("Log file information:");
        print_rows(&self.log.info().entries());
    }

    pub fn log_off(&mut self) -> Result<()> {
        info!("Debug logger is getting disabled.");
        self.log.disable();
        self.settings.set_logging(false)?;
        println!("Logger turned off.");
        Ok(())
    }

    pub fn log_on(&mut self) -> Result<()> {
        self.log.enable();
        info!("Debug logger enabled.");
        self.settings.set_logging(true)?;
        println!("Logger turned on.");
        Ok(())
    }

    pub fn show_settings(&self) {
        println!("{:-^40}", "General information");
        print_rows(&[("settings_file", self.settings.path().display().to_string())]);
        print_rows(&self.settings.entries());
        println!("{:-^40}", "Log file information");
        print_rows(&self.log.info().entries());
    }

    /// Stored tokens are verified; without them the user walks through OAuth.
    /// Rejected tokens are cleared from the settings file.
    pub async fn authenticate(&mut self) -> Result<DiscogsClient> {
        let client = DiscogsClient::new(
            &self.settings.user_agent,
            ConsumerCredentials {
                key: self.settings.consumer_key.clone(),
                secret: self.settings.consumer_secret.clone(),
            },
        )?
        .with_endpoints(&self.discogs);

        if let (Some(token), Some(secret)) = (
            self.settings.access_token.clone(),
            self.settings.access_secret.clone(),
        ) {
            info!("Authenticating with discogs from memory.");
            let client = client.with_access_token(AccessToken { token, secret });

            return match client.identity().await {
                Ok(user) => {
                    info!("Successfully authenticated as {}.", user);
                    Ok(client)
                }
                Err(e) => {
                    error!("Verification failed with discogs client: {:#}", e);
                    self.settings
                        .clear_tokens()
                        .context("Could not store authentication settings")?;
                    info!("Access tokens cleared.");
                    println!(
                        "{}",
                        "Unable to authenticate with Discogs. Access tokens cleared, please try again."
                            .bright_red()
                    );
                    Err(e.context("Stored Discogs tokens were rejected"))
                }
            };
        }

        info!("Requesting manual authentication from discogs.");
        let (request, authorize_url) = client.request_token().await?;

        println!("{}", "Discogs authorization required.".bright_yellow());
        println!("Open the following page, allow access and paste the code shown:");
        println!("  {}", authorize_url.bright_cyan());

        let verifier = prompt::verification_code()?;
        self.authorize(client, &request, &verifier).await
    }

    /// Trade the verification code for access tokens and remember them.
    pub async fn authorize(
        &mut self,
        client: DiscogsClient,
        request: &RequestToken,
        verifier: &str,
    ) -> Result<DiscogsClient> {
        let access = match client.access_token(request, verifier).await {
            Ok(access) => access,
            Err(e) => {
                error!("Verification failed with discogs client: {:#}", e);
                return Err(e.context("Unable to authenticate"));
            }
        };
        info!("Authorisation code verified, saving tokens.");

        if let Err(e) = self
            .settings
            .store_tokens(access.token.clone(), access.secret.clone())
        {
            warn!("Could not store authentication settings: {:#}", e);
            println!(
                "{} Could not save the Discogs tokens; you will be asked again next time.",
                "⚠".bright_yellow()
            );
        }

        Ok(client.with_access_token(access))
    }
}

fn progress_bar(total: usize, step: &str) -> Progress {
    Progress::new(total).with_prefix(step).with_suffix("Complete")
}

fn print_rows(rows: &[(&'static str, String)]) {
    for (key, value) in rows {
        println!("{:<20}{}", key, value);
    }
}
