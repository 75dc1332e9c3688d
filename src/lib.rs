pub mod cli;
pub mod config;
pub mod engine;
pub mod probe;
pub mod resolve;
pub mod telemetry;

use std::process::ExitStatus;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use crate::config::KioskSettings;
use crate::engine::{BrowserLauncher, CommandSpec, Platform};
use crate::probe::{BlockingProbeHttp, EndpointProber, ProbeHttp};
use crate::resolve::{Pacer, Resolution, Resolver, ThreadPacer};

/// Primary orchestrator: find the arena server, settle the display ID, open the browser.
pub struct Kiosk {
    settings: KioskSettings,
    launcher: BrowserLauncher,
}

impl Kiosk {
    /// Construct a kiosk for the running host. Fails on an unsupported platform.
    pub fn from_settings(settings: KioskSettings) -> Result<Self> {
        let platform = Platform::detect()?;
        Self::with_platform(settings, platform)
    }

    /// Construct a kiosk for a named OS, as reported by `std::env::consts::OS`.
    pub fn for_os(settings: KioskSettings, os: &str) -> Result<Self> {
        let platform = Platform::from_os(os)?;
        Self::with_platform(settings, platform)
    }

    pub fn with_platform(settings: KioskSettings, platform: Platform) -> Result<Self> {
        settings.validate().context("Invalid kiosk configuration")?;
        let launcher = BrowserLauncher::new(platform, settings.browser.clone());
        Ok(Self { settings, launcher })
    }

    pub fn settings(&self) -> &KioskSettings {
        &self.settings
    }

    pub fn platform(&self) -> Platform {
        self.launcher.platform()
    }

    /// Resolver wired to the real network and a sleeping pacer.
    pub fn resolver(&self) -> Result<Resolver<BlockingProbeHttp, ThreadPacer>> {
        let http = BlockingProbeHttp::new(self.settings.http_timeout())?;
        Ok(self.resolver_with(http, ThreadPacer))
    }

    pub fn resolver_with<H: ProbeHttp, P: Pacer>(&self, http: H, pacer: P) -> Resolver<H, P> {
        Resolver::new(
            EndpointProber::new(http),
            pacer,
            self.settings.endpoints.ordered(),
            self.settings.poll_period(),
            self.settings.display_id_path.clone(),
        )
    }

    /// Resolve over the network, then launch (or describe, when `execute` is false).
    pub fn run(&self, execute: bool) -> Result<LaunchOutcome> {
        let resolver = self.resolver()?;
        self.run_with(&resolver, execute)
    }

    pub fn run_with<H: ProbeHttp, P: Pacer>(
        &self,
        resolver: &Resolver<H, P>,
        execute: bool,
    ) -> Result<LaunchOutcome> {
        let span = info_span!("kiosk.run", platform = %self.platform(), execute);
        let _span_guard = span.enter();

        let resolution = resolver.resolve();
        let url = resolution.display_url();
        let command = self.launcher.build_command(&url)?;

        info!(
            endpoint = %resolution.endpoint.kind,
            display_id = %resolution.display_id,
            source = %resolution.source,
            attempts = resolution.attempts,
            url = %url,
            resolved_at = %resolution.resolved_at.to_rfc3339(),
            "resolved arena display"
        );

        let exit_status = if execute {
            Some(self.launcher.launch(&command)?)
        } else {
            None
        };

        Ok(LaunchOutcome {
            resolution,
            command,
            exit_status,
        })
    }
}

/// Result of a kiosk run.
#[derive(Debug)]
pub struct LaunchOutcome {
    pub resolution: Resolution,
    pub command: CommandSpec,
    exit_status: Option<ExitStatus>,
}

impl LaunchOutcome {
    pub fn executed(&self) -> bool {
        self.exit_status.is_some()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LOCAL_URL, DEFAULT_REMOTE_URL, EndpointKind};
    use crate::probe::tests::{StubProbeHttp, redirect, timeout};
    use crate::resolve::DisplayIdSource;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    struct NoPause;

    impl Pacer for NoPause {
        fn pause(&self, _period: Duration) {}
    }

    fn settings_in(dir: &std::path::Path) -> KioskSettings {
        let mut settings = KioskSettings::default();
        settings.display_id_path = dir.join("display_id");
        settings.browser.binary_path = Some(PathBuf::from("/usr/bin/chromium-browser"));
        settings
    }

    #[test]
    fn unsupported_os_is_rejected_before_launch() {
        let dir = tempdir().unwrap();
        let err = Kiosk::for_os(settings_in(dir.path()), "windows")
            .err()
            .expect("windows is unsupported");
        assert!(err.to_string().contains("unsupported operating system 'windows'"));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.endpoints.local = "10.0.100.5:8080".into();
        assert!(Kiosk::for_os(settings, "linux").is_err());
    }

    #[test]
    fn dry_run_builds_command_for_resolved_display() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("display_id"), "3\n").unwrap();
        let kiosk = Kiosk::for_os(settings_in(dir.path()), "linux").unwrap();
        let stub = StubProbeHttp::new()
            .always(DEFAULT_LOCAL_URL, timeout())
            .always(DEFAULT_REMOTE_URL, redirect("/display?displayId=9"));
        let resolver = kiosk.resolver_with(stub, NoPause);

        let outcome = kiosk.run_with(&resolver, false).unwrap();
        assert!(!outcome.executed());
        assert_eq!(outcome.resolution.endpoint.kind, EndpointKind::Remote);
        assert_eq!(outcome.resolution.source, DisplayIdSource::Stored);
        assert_eq!(
            outcome.command.args(),
            &[
                "--start-fullscreen".to_string(),
                "--app=https://cheesyarena.com/display?displayId=3".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn browser_failure_exit_stops_the_kiosk() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.browser.binary_path = Some(PathBuf::from("false"));
        let kiosk = Kiosk::for_os(settings, "linux").unwrap();
        let stub =
            StubProbeHttp::new().always(DEFAULT_LOCAL_URL, redirect("/display?displayId=4"));
        let resolver = kiosk.resolver_with(stub, NoPause);

        let err = kiosk.run_with(&resolver, true).unwrap_err();
        assert!(err.to_string().contains("exited with status 1"));
    }
}
