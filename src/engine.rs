use std::{
    env,
    path::PathBuf,
    process::{Command, ExitStatus},
};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::config::BrowserSettings;

/// Host operating systems the kiosk knows how to launch a browser on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
}

impl Platform {
    /// Platform of the running process.
    pub fn detect() -> Result<Self> {
        Self::from_os(env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`.
    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "macos" => Ok(Platform::MacOs),
            "linux" => Ok(Platform::Linux),
            other => bail!(
                "Don't know how to launch browser for unsupported operating system '{other}'"
            ),
        }
    }

    fn default_binary(&self) -> &'static str {
        match self {
            Platform::MacOs => "open",
            Platform::Linux => "chromium-browser",
        }
    }

    fn launch_args(&self, url: &str) -> Vec<String> {
        let app = format!("--app={url}");
        match self {
            Platform::MacOs => vec![
                "-a".into(),
                "Google Chrome".into(),
                "--args".into(),
                "--start-fullscreen".into(),
                app,
            ],
            Platform::Linux => vec!["--start-fullscreen".into(), app],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::MacOs => write!(f, "macos"),
            Platform::Linux => write!(f, "linux"),
        }
    }
}

/// Materialised command specification ready to be spawned or logged.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    binary: PathBuf,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(binary: PathBuf, args: Vec<String>) -> Self {
        Self { binary, args }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(&self.args);
        command
    }

    pub fn describe(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(' ') {
                    format!("\"{arg}\"")
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", self.binary.display(), args)
    }
}

/// Builds and runs the full-screen app-mode browser for one platform.
pub struct BrowserLauncher {
    platform: Platform,
    config: BrowserSettings,
}

impl BrowserLauncher {
    pub fn new(platform: Platform, config: BrowserSettings) -> Self {
        Self { platform, config }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    fn locate_binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.binary_path {
            return Ok(path.clone());
        }
        let name = self.platform.default_binary();
        which::which(name).with_context(|| {
            format!("{name} not found on PATH; install it or set browser.binary_path")
        })
    }

    pub fn build_command(&self, url: &str) -> Result<CommandSpec> {
        let binary = self.locate_binary()?;
        let args = merge_args(self.platform.launch_args(url), self.config.extra_args.clone());
        Ok(CommandSpec::new(binary, args))
    }

    /// Spawn the browser and stay its parent until it exits.
    pub fn launch(&self, command: &CommandSpec) -> Result<ExitStatus> {
        info!(platform = %self.platform, command = %command.describe(), "launching browser");
        let mut child = command
            .to_command()
            .spawn()
            .with_context(|| format!("Failed to spawn {}", command.binary().display()))?;
        let pid = child.id();
        let status = child
            .wait()
            .with_context(|| format!("Failed to wait on browser process {pid}"))?;
        if !status.success() {
            match status.code() {
                Some(code) => bail!("browser process {pid} exited with status {code}"),
                None => bail!("browser process {pid} was terminated by a signal"),
            }
        }
        info!(pid, "browser exited");
        Ok(status)
    }
}

/// Append `extras` after `base`; a repeated flag keeps only its last position.
fn merge_args(base: Vec<String>, extras: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(base.len() + extras.len());
    for arg in base.into_iter().chain(extras) {
        merged.retain(|existing| existing != &arg);
        merged.push(arg);
    }
    merged
}
