use std::sync::Arc;

use cellar_common::concurrency::SharedHandle;
use tracing::info;

use crate::{Client, Configuration, Error};

/// Process-wide access to the ledger. The client is connected on first acquisition, which
/// also checks the endpoint serves the configured network. Clones share the same client.
#[derive(Clone)]
pub struct LedgerHandle {
    configuration: Configuration,
    client: SharedHandle<Client>,

    /// Client connected in place of the configured endpoint
    #[cfg(feature = "testing")]
    unverified: Option<Client>,
}

impl LedgerHandle {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            client: SharedHandle::new(),

            #[cfg(feature = "testing")]
            unverified: None,
        }
    }

    /// Handle connecting to `client` on first acquisition, with the same checks as a node
    #[cfg(feature = "testing")]
    pub fn from_unverified_client(configuration: Configuration, client: Client) -> Self {
        Self {
            unverified: Some(client),
            ..Self::new(configuration)
        }
    }

    /// Handle whose client is already initialized
    pub async fn from_client(configuration: Configuration, client: Client) -> Self {
        let handle = Self::new(configuration);
        let _ = handle.client.get_or_try_init(|| async move { Ok::<_, Error>(client) }).await;

        handle
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub async fn is_initialized(&self) -> bool {
        self.client.is_initialized().await
    }

    pub async fn acquire(&self) -> Result<Arc<Client>, Error> {
        self.client.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Client, Error> {
        #[cfg(feature = "testing")]
        let client = match &self.unverified {
            Some(client) => client.clone(),
            None => Client::new(&self.configuration)?,
        };
        #[cfg(not(feature = "testing"))]
        let client = Client::new(&self.configuration)?;

        Self::verify(&client).await?;

        Ok(client)
    }

    async fn verify(client: &Client) -> Result<(), Error> {
        let found = client.chain_identifier().await?;
        if let Some(expected) = client.network().chain_identifier() {
            if expected != found {
                return Err(Error::ChainMismatch {
                    expected: expected.to_string(),
                    found,
                });
            }
        }

        info!(network = %client.network(), chain = %found, "ledger client connected");
        Ok(())
    }
}
