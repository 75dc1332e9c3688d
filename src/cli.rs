use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};
use tracing::{error, info, warn};

use crate::{
    Kiosk,
    config::{ConfigSource, KioskSettings, default_config_path},
    telemetry,
};

#[derive(Parser, Debug)]
#[command(name = "arena-kiosk", author, version, about = "Arena display kiosk launcher", long_about = None)]
pub struct Cli {
    /// Custom config path.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the field network server URL (must end in `displayId=`).
    #[arg(long, value_name = "URL")]
    pub local_url: Option<String>,

    /// Override the internet server URL (must end in `displayId=`).
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Read a provisioned display ID from this file instead of the configured one.
    #[arg(long, value_name = "FILE")]
    pub display_id_file: Option<PathBuf>,

    /// Append logs to this file instead of the configured one.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Resolve the display, then print the browser command instead of running it.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Increase logging verbosity.
    #[arg(long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, settings: &mut KioskSettings) {
        if let Some(url) = &self.local_url {
            settings.endpoints.local = url.clone();
        }
        if let Some(url) = &self.remote_url {
            settings.endpoints.remote = url.clone();
        }
        if let Some(path) = &self.display_id_file {
            settings.display_id_path = path.clone();
        }
        if let Some(path) = &self.log_file {
            settings.log_file = path.clone();
        }
    }
}

fn load_settings(cli: &Cli) -> Result<(KioskSettings, ConfigSource)> {
    let (mut settings, source) = match cli.config.clone() {
        Some(path) => {
            let settings = KioskSettings::load_or_default(&path)?;
            (settings, ConfigSource::File(path))
        }
        None => KioskSettings::load_from_default_location(default_config_path())?,
    };
    cli.apply_overrides(&mut settings);
    Ok((settings, source))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let (settings, source) = load_settings(&cli)?;
    telemetry::init_tracing(&settings.log_file, cli.verbose)?;

    match &source {
        ConfigSource::File(path) => info!(path = %path.display(), "using kiosk config"),
        ConfigSource::Defaults { reason } => {
            warn!(reason = %reason, "config location unusable; running with built-in defaults")
        }
    }

    let result = launch(settings, cli.dry_run);
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "arena kiosk stopped");
    }
    result
}

fn launch(settings: KioskSettings, dry_run: bool) -> Result<()> {
    info!(
        log_file = %settings.log_file.display(),
        local = %settings.endpoints.local,
        remote = %settings.endpoints.remote,
        "starting arena kiosk"
    );
    let kiosk = Kiosk::from_settings(settings)?;
    let outcome = kiosk.run(!dry_run)?;

    match outcome.exit_status() {
        Some(status) => info!(code = ?status.code(), "browser session ended"),
        None => println!("{}", outcome.command.describe()),
    }
    Ok(())
}
