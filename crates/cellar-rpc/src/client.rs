use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient};

use crate::middleware::ADMIN_KEY_HEADER;
use crate::{
    CellarAPIClient, ExecuteSponsoredRequest, ExecuteSponsoredResponse, MintBottleRequest, MintBottleResponse, SponsorTransactionRequest, SponsorTransactionResponse,
};

pub type Error = jsonrpsee::core::ClientError;

/// Typed client of the cellar JSON-RPC API
pub struct Client {
    pub(crate) inner: HttpClient,
}

impl Client {
    pub fn new(endpoint: &str) -> Result<Self, Error> {
        Ok(Self {
            inner: HttpClient::builder().build(endpoint)?,
        })
    }

    /// Client sending `admin_key` with every request, required to mint
    pub fn with_admin_key(endpoint: &str, admin_key: &str) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ADMIN_KEY_HEADER,
            HeaderValue::from_str(admin_key).map_err(|_| Error::Custom("admin key is not a valid header value".to_string()))?,
        );

        Ok(Self {
            inner: HttpClient::builder().set_headers(headers).build(endpoint)?,
        })
    }

    pub async fn health(&self) -> Result<bool, Error> {
        self.inner.health().await
    }

    pub async fn sponsor_transaction(&self, params: SponsorTransactionRequest) -> Result<SponsorTransactionResponse, Error> {
        self.inner.sponsor_transaction(params).await
    }

    pub async fn execute_sponsored_transaction(&self, params: ExecuteSponsoredRequest) -> Result<ExecuteSponsoredResponse, Error> {
        self.inner.execute_sponsored_transaction(params).await
    }

    pub async fn mint_bottle(&self, params: MintBottleRequest) -> Result<MintBottleResponse, Error> {
        self.inner.mint_bottle(params).await
    }
}
