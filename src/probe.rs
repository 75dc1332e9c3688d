use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tracing::info;

static DISPLAY_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"displayId=(\d+)").expect("display id pattern is valid"));

/// Raw view of a probe response: the only two things the prober inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub location: Option<String>,
}

/// Transport used to issue a single probe GET without following redirects.
pub trait ProbeHttp {
    fn get(&self, url: &str) -> Result<ProbeResponse>;
}

pub struct BlockingProbeHttp {
    client: Client,
}

impl BlockingProbeHttp {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("arena-kiosk/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .context("failed to build probe HTTP client")?;
        Ok(Self { client })
    }
}

impl ProbeHttp for BlockingProbeHttp {
    fn get(&self, url: &str) -> Result<ProbeResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to reach {url}"))?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(ProbeResponse {
            status: response.status().as_u16(),
            location,
        })
    }
}

/// Pull the suggested identifier out of a redirect `Location` value.
pub fn extract_display_id(location: &str) -> Option<String> {
    DISPLAY_ID_PATTERN
        .captures(location)
        .and_then(|captures| captures.get(1))
        .map(|digits| digits.as_str().to_string())
}

/// Checks one endpoint for a live arena server and harvests its suggested display ID.
pub struct EndpointProber<H> {
    http: H,
}

impl<H: ProbeHttp> EndpointProber<H> {
    pub fn new(http: H) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    /// Returns the suggested display ID, or `None` on any failure.
    pub fn try_get_display_id(&self, url: &str) -> Option<String> {
        info!(url, "checking for a connection to the arena server");
        let response = match self.http.get(url) {
            Ok(response) => response,
            Err(err) => {
                info!(url, error = %format!("{err:#}"), "probe request failed");
                return None;
            }
        };

        if response.status != StatusCode::FOUND.as_u16() {
            info!(url, status = response.status, "probe did not return a redirect");
            return None;
        }

        let Some(location) = response.location.as_deref() else {
            info!(url, "redirect carried no Location header");
            return None;
        };

        match extract_display_id(location) {
            Some(display_id) => {
                info!(url, display_id = %display_id, "connected with suggested display ID");
                Some(display_id)
            }
            None => {
                info!(url, location, "redirect Location has no display ID");
                None
            }
        }
    }
}
