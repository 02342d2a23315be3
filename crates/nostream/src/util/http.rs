use std::{ops::Deref, time::Duration};

use reqwest::{Client, ClientBuilder};

use crate::{config::LoaderConfig, error::NostreamResult};

const DEFAULT_USER_AGENT: &str = concat!("nostream/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> NostreamResult<Self> {
        let client = builder.build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &LoaderConfig) -> NostreamResult<Self> {
        let mut builder = Client::builder().user_agent(
            config
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        );
        if let Some(timeout) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        Self::new(builder)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
