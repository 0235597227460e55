//! Public IP lookup through a chain of IP echo services.

use std::net::IpAddr;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{HostFactsError, Result};

pub const SERVICE_TIMEOUT: Duration = Duration::from_secs(5);

/// A service that answers with the caller's public address.
pub trait IpEchoService {
    /// Identifier used when reporting failures (usually the URL).
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<String>;
}

/// Plain-text echo service over HTTP GET.
pub struct HttpEchoService {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpEchoService {
    pub fn new<S: Into<String>>(url: S) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("hostfacts/", env!("CARGO_PKG_VERSION")))
            .timeout(SERVICE_TIMEOUT)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl IpEchoService for HttpEchoService {
    fn name(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<String> {
        let response = self.client.get(&self.url).send()?;

        if !response.status().is_success() {
            return Err(HostFactsError::transport(format!(
                "status {}",
                response.status()
            )));
        }

        Ok(response.text()?)
    }
}

/// A service that failed, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub service: String,
    pub reason: String,
}

/// Outcome of a lookup. All services failing is not an error: `address` is
/// simply `None` and every failure is listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicIpLookup {
    pub address: Option<IpAddr>,
    pub failures: Vec<ServiceFailure>,
}

/// Try each service in order; the first that answers with an IP address wins.
pub fn lookup_public_ip(services: &[Box<dyn IpEchoService>]) -> PublicIpLookup {
    let mut lookup = PublicIpLookup::default();

    for service in services {
        let outcome = service.fetch().and_then(|body| {
            let body = body.trim();
            body.parse::<IpAddr>().map_err(|_| {
                let shown: String = body.chars().take(40).collect();
                HostFactsError::parse(format!("not an IP address: '{}'", shown))
            })
        });

        match outcome {
            Ok(address) => {
                info!("Public IP {} from {}", address, service.name());
                lookup.address = Some(address);
                return lookup;
            }
            Err(e) => {
                warn!("IP service {} failed: {}", service.name(), e);
                lookup.failures.push(ServiceFailure {
                    service: service.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!("No IP echo service answered");
    lookup
}

/// HTTP services for each configured URL.
pub fn http_services(urls: &[String]) -> Result<Vec<Box<dyn IpEchoService>>> {
    urls.iter()
        .map(|url| HttpEchoService::new(url.as_str()).map(|s| Box::new(s) as Box<dyn IpEchoService>))
        .collect()
}
