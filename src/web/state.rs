//! Shared application state, built once at startup.

use reqwest::Client;
use std::sync::Arc;

use crate::chain::{create_chain_client, AddressFormat, ChainClient};
use crate::config::Settings;
use crate::core::{Interpreter, Resolver};
use crate::error::{Error, Result, ServiceError, ServiceResult};
use crate::oracle::{HermesClient, Oracle, PriceFeed};
use crate::providers::{create_text_generator, TextGenerator};
use crate::store::{Datastore, SqliteDatastore};

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<dyn ChainClient>,
    pub datastore: Option<Arc<dyn Datastore>>,
    pub interpreter: Option<Interpreter>,
    pub resolver: Resolver,
    pub oracle: Oracle,
    pub address_format: AddressFormat,
}

/// One HTTP client for every outbound call, with the configured timeout.
pub fn build_http_client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .timeout(settings.http.timeout())
        .user_agent(concat!("chainchat/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Error::from)
}

impl AppState {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        datastore: Option<Arc<dyn Datastore>>,
        generator: Option<Arc<dyn TextGenerator>>,
        feed: Arc<dyn PriceFeed>,
    ) -> Self {
        let address_format = chain.address_format();
        let oracle = Oracle::new(feed);
        let resolver = Resolver::new(datastore.clone(), oracle.clone(), address_format);
        let interpreter = generator.map(|g| Interpreter::new(g, address_format));

        Self {
            chain,
            datastore,
            interpreter,
            resolver,
            oracle,
            address_format,
        }
    }

    /// Wire up the real collaborators described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = build_http_client(settings)?;

        let chain = create_chain_client(settings, http.clone());
        let datastore: Option<Arc<dyn Datastore>> = match &settings.datastore.path {
            Some(path) => Some(Arc::new(SqliteDatastore::open(path)?)),
            None => {
                tracing::warn!("No datastore.path configured; record routes are disabled");
                None
            }
        };
        let generator = create_text_generator(settings, http.clone());
        let feed = Arc::new(HermesClient::new(http, settings.oracle.base_url.clone()));

        tracing::info!(
            "Collaborators ready: chain={}, datastore={}, llm={}",
            chain.name(),
            datastore.is_some(),
            generator.as_ref().map(|g| g.model()).unwrap_or("none")
        );

        Ok(Self::new(chain, datastore, generator, feed))
    }

    pub fn datastore(&self) -> ServiceResult<&dyn Datastore> {
        self.datastore
            .as_deref()
            .ok_or(ServiceError::NotConfigured("Datastore"))
    }
}
