//! Candidate endpoint resolution.
//!
//! A configured bridge endpoint is often reachable under several equivalent
//! addresses: the loopback address, `localhost`, or the browser's own
//! hostname, each with or without the route suffix. Resolution expands the
//! configured value into that deterministic, deduplicated candidate list.

use super::BridgeError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

const LOOPBACK_V4: &str = "127.0.0.1";
const LOCALHOST: &str = "localhost";

/// One candidate address of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BridgeEndpoint {
    /// URL commands are posted to.
    pub command_url: String,
    /// URL the `/logs`, `/cancel`, `/health` and `/window` routes hang off.
    pub base_url: String,
}

impl BridgeEndpoint {
    /// Returns `base_url` joined with `route`.
    #[must_use]
    pub fn route(&self, route: &str) -> String {
        join_route(&self.base_url, route)
    }
}

/// Joins a base URL and a route without doubling slashes.
#[must_use]
pub fn join_route(base_url: &str, route: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}

/// Strategy object turning a configured endpoint into candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResolver {
    configured: String,
    route_suffix: String,
    browser_host: Option<String>,
}

impl EndpointResolver {
    /// Creates a resolver.
    ///
    /// `route_suffix` is the path segment the command route lives under
    /// (typically `/run`); `browser_host` is an optional hostname alias for
    /// the loopback interface.
    #[must_use]
    pub fn new(
        configured: impl Into<String>,
        route_suffix: impl Into<String>,
        browser_host: Option<String>,
    ) -> Self {
        Self {
            configured: configured.into(),
            route_suffix: route_suffix.into(),
            browser_host: browser_host
                .map(|host| host.trim().to_owned())
                .filter(|host| !host.is_empty()),
        }
    }

    /// Returns the configured endpoint text.
    #[must_use]
    pub fn configured(&self) -> &str {
        &self.configured
    }

    /// Expands the configured endpoint into ordered candidates.
    ///
    /// The configured address always comes first. Loopback hosts (and the
    /// browser host alias) expand to every alias; path variants toggle the
    /// route suffix. Duplicates are removed keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidEndpoint`] when the endpoint is blank,
    /// unparseable or has no host.
    pub fn resolve(&self) -> Result<Vec<BridgeEndpoint>, BridgeError> {
        let url = self.parse()?;
        let scheme = url.scheme().to_owned();
        let port = url.port().map(|value| format!(":{value}")).unwrap_or_default();
        let suffix = normalize_suffix(&self.route_suffix);
        let path = url.path().trim_end_matches('/').to_owned();

        let mut candidates: Vec<BridgeEndpoint> = Vec::new();
        for host in self.host_variants(&url)? {
            for variant in path_variants(&path, &suffix) {
                let authority = format!("{scheme}://{host}{port}");
                let base_path = strip_suffix(&variant, &suffix);
                let candidate = BridgeEndpoint {
                    command_url: format!("{authority}{variant}"),
                    base_url: format!("{authority}{base_path}"),
                };
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        Ok(candidates)
    }

    fn parse(&self) -> Result<Url, BridgeError> {
        let trimmed = self.configured.trim();
        if trimmed.is_empty() {
            return Err(self.invalid("endpoint is empty"));
        }
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("http://{trimmed}")
        };
        Url::parse(&with_scheme).map_err(|err| self.invalid(&err.to_string()))
    }

    fn host_variants(&self, url: &Url) -> Result<Vec<String>, BridgeError> {
        let host = url
            .host_str()
            .ok_or_else(|| self.invalid("endpoint has no host"))?
            .to_owned();
        let aliases_loopback = url.host().is_some_and(|parsed| is_loopback(&parsed))
            || self
                .browser_host
                .as_deref()
                .is_some_and(|alias| alias.eq_ignore_ascii_case(&host));
        if !aliases_loopback {
            return Ok(vec![host]);
        }

        let mut hosts = vec![host, LOOPBACK_V4.to_owned(), LOCALHOST.to_owned()];
        hosts.extend(self.browser_host.clone());
        let mut unique: Vec<String> = Vec::with_capacity(hosts.len());
        for candidate in hosts {
            if !unique
                .iter()
                .any(|seen| seen.eq_ignore_ascii_case(&candidate))
            {
                unique.push(candidate);
            }
        }
        Ok(unique)
    }

    fn invalid(&self, reason: &str) -> BridgeError {
        BridgeError::InvalidEndpoint {
            endpoint: self.configured.clone(),
            reason: reason.to_owned(),
        }
    }
}

/// Returns each distinct base URL in candidate order.
#[must_use]
pub fn base_urls(candidates: &[BridgeEndpoint]) -> Vec<String> {
    let mut bases: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !bases.contains(&candidate.base_url) {
            bases.push(candidate.base_url.clone());
        }
    }
    bases
}

fn is_loopback(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case(LOCALHOST),
        Host::Ipv4(address) => address.is_loopback() || *address == Ipv4Addr::UNSPECIFIED,
        Host::Ipv6(address) => address.is_loopback() || *address == Ipv6Addr::UNSPECIFIED,
    }
}

fn normalize_suffix(suffix: &str) -> String {
    let trimmed = suffix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn path_variants(path: &str, suffix: &str) -> Vec<String> {
    if suffix.is_empty() {
        return vec![path.to_owned()];
    }
    let toggled = path
        .strip_suffix(suffix)
        .map_or_else(|| format!("{path}{suffix}"), str::to_owned);
    vec![path.to_owned(), toggled]
}

fn strip_suffix(path: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return path.to_owned();
    }
    path.strip_suffix(suffix).unwrap_or(path).to_owned()
}
