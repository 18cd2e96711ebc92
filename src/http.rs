use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::{thread, time::Duration};

use crate::error::{Error, Result};

pub const DEFAULT_USER_AGENT: &str =
    "GuessHeritageBot/1.0 (https://github.com/guess-heritage; heritage-images@example.com)";

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
    /// Slept before every outbound call.
    pub delay: Duration,
    /// Slept after the remote service answers 429.
    pub rate_limit_pause: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            delay: Duration::from_millis(300),
            rate_limit_pause: Duration::from_secs(30),
        }
    }
}

/// Blocking JSON client shared by the Wikidata and Commons clients. Calls are
/// strictly sequential and throttled.
pub struct Api {
    client: Client,
    settings: HttpSettings,
}

impl Api {
    pub fn new(settings: HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| Error::Config(format!("can't build HTTP client: {}", err)))?;

        Ok(Api { client, settings })
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        service: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        if !self.settings.delay.is_zero() {
            thread::sleep(self.settings.delay);
        }

        debug!("GET {} {:?}", url, query);

        let res = self
            .client
            .get(url)
            .query(query)
            .header(USER_AGENT, &self.settings.user_agent)
            .send()
            .map_err(|err| {
                warn!("Got an error from {} API: {}", service, err);
                Error::from(err)
            })?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                "Rate limited by {} API, waiting {} seconds",
                service,
                self.settings.rate_limit_pause.as_secs()
            );
            thread::sleep(self.settings.rate_limit_pause);
            return Err(Error::Network(format!("{} API rate limited", service)));
        }

        if !res.status().is_success() {
            return Err(Error::Network(format!(
                "{} API answered {}",
                service,
                res.status()
            )));
        }

        res.json::<T>().map_err(|err| {
            warn!("Can't parse {} response: {}", service, err);
            Error::Network(format!("unreadable {} response: {}", service, err))
        })
    }
}
