use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span};

use crate::config::Endpoint;
use crate::probe::{EndpointProber, ProbeHttp};

/// Where the display ID used for the launch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayIdSource {
    /// Operator-provisioned file on local storage.
    Stored,
    /// Redirect suggestion from the arena server.
    Suggested,
}

impl std::fmt::Display for DisplayIdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayIdSource::Stored => write!(f, "stored"),
            DisplayIdSource::Suggested => write!(f, "suggested"),
        }
    }
}

/// Winning endpoint plus the display ID to launch with.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub endpoint: Endpoint,
    pub suggested_id: String,
    pub display_id: String,
    pub source: DisplayIdSource,
    /// Full probe cycles run, including the successful one.
    pub attempts: u64,
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    pub fn display_url(&self) -> String {
        self.endpoint.display_url(&self.display_id)
    }
}

/// Blocks between probe cycles.
pub trait Pacer {
    fn pause(&self, period: Duration);
}

pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, period: Duration) {
        thread::sleep(period);
    }
}

/// Polls the endpoints in priority order until one answers, then settles the display ID.
pub struct Resolver<H, P> {
    prober: EndpointProber<H>,
    pacer: P,
    endpoints: [Endpoint; 2],
    poll_period: Duration,
    display_id_path: PathBuf,
}

impl<H: ProbeHttp, P: Pacer> Resolver<H, P> {
    pub fn new(
        prober: EndpointProber<H>,
        pacer: P,
        endpoints: [Endpoint; 2],
        poll_period: Duration,
        display_id_path: PathBuf,
    ) -> Self {
        Self {
            prober,
            pacer,
            endpoints,
            poll_period,
            display_id_path,
        }
    }

    pub fn prober(&self) -> &EndpointProber<H> {
        &self.prober
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Runs until an endpoint succeeds. There is no retry cap.
    pub fn resolve(&self) -> Resolution {
        let span = info_span!(
            "resolver.resolve",
            poll_period_ms = self.poll_period.as_millis() as u64
        );
        let _span_guard = span.enter();

        let mut attempts: u64 = 0;
        let (endpoint, suggested_id) = loop {
            attempts += 1;
            if let Some(found) = self.probe_cycle() {
                break found;
            }
            info!(
                attempt = attempts,
                wait_secs = self.poll_period.as_secs_f64(),
                "unsuccessful at connecting; waiting before trying again"
            );
            self.pacer.pause(self.poll_period);
        };

        let (display_id, source) = match read_stored_display_id(&self.display_id_path) {
            Some(stored) => {
                info!(
                    display_id = %stored,
                    path = %self.display_id_path.display(),
                    "using existing stored display ID"
                );
                (stored, DisplayIdSource::Stored)
            }
            None => {
                info!(display_id = %suggested_id, "using new display ID");
                (suggested_id.clone(), DisplayIdSource::Suggested)
            }
        };

        Resolution {
            endpoint,
            suggested_id,
            display_id,
            source,
            attempts,
            resolved_at: Utc::now(),
        }
    }

    fn probe_cycle(&self) -> Option<(Endpoint, String)> {
        self.endpoints.iter().find_map(|endpoint| {
            self.prober
                .try_get_display_id(&endpoint.base_url)
                .map(|display_id| (endpoint.clone(), display_id))
        })
    }
}

/// Reads the operator-provisioned display ID. Missing, unreadable or blank files yield `None`.
pub fn read_stored_display_id(path: &Path) -> Option<String> {
    let raw = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no stored display ID");
            return None;
        }
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        debug!(path = %path.display(), "stored display ID file is empty");
        return None;
    }
    Some(trimmed.to_string())
}
