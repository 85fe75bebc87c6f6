use std::net::SocketAddr;

use async_trait::async_trait;
use cellar_common::service::Error as ServiceError;
use cellar_common::{measure_duration, metric};
use hyper::http::Extensions;
use jsonrpsee::server::middleware::http::ProxyGetRequestLayer;
use jsonrpsee::server::{RpcServiceBuilder, ServerBuilder, ServerHandle};
use tokio::net::ToSocketAddrs;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, instrument, warn};

use crate::context::Context;
use crate::endpoint::execute::execute_sponsored_endpoint;
use crate::endpoint::mint::mint_bottle_endpoint;
use crate::endpoint::sponsor::sponsor_transaction_endpoint;
use crate::endpoint::RequestContext;
use crate::middleware::{AuthenticationLayer, PayloadFormatter};
use crate::{
    CellarAPIServer, Configuration, Error, ExecuteSponsoredRequest, ExecuteSponsoredResponse, MintBottleRequest, MintBottleResponse, SponsorTransactionRequest,
    SponsorTransactionResponse,
};

#[macro_export]
macro_rules! log_if_error {
    ($e: expr) => {{
        let result = $e;
        match &result {
            Err(e) if e.is_alert() => error!(message=%e),
            Err(e) => warn!(message=%e),
            _ => ()
        };

        result
    }};
}

macro_rules! instrument_method {
    ($method: ident ($($arg: expr),*)) => {{
        metric!(counter [ rpc_request ] = 1, method = stringify!($method));

        let (result, time) = measure_duration!(log_if_error!($method($($arg),*).await));
        metric!(histogram [ rpc_request_duration_milliseconds ] = time.as_millis(), method = stringify!($method));
        metric!(on error result => counter [ rpc_request_error ] = 1, method = stringify!($method));

        result
    }};
}

pub struct CellarServer {
    context: Context,
}

impl CellarServer {
    pub fn new(configuration: &Configuration) -> Result<Self, Error> {
        Ok(Self {
            context: Context::new(configuration.clone())?,
        })
    }

    pub async fn start(self) -> Result<ServerHandle, ServiceError> {
        let url = format!("0.0.0.0:{}", self.context.configuration.rpc.port);
        let (address, handle) = self.listen(url).await?;
        info!("RPC server listening at {}", address);

        Ok(handle)
    }

    /// Serves on `address` and returns the address actually bound
    pub async fn listen(self, address: impl ToSocketAddrs) -> Result<(SocketAddr, ServerHandle), ServiceError> {
        info!("Starting RPC server on {}", self.context.execution.network());

        let http_middleware = ServiceBuilder::new()
            .layer(CorsLayer::permissive())
            .layer(AuthenticationLayer)
            .layer(ProxyGetRequestLayer::new("/health", "cellar_health").map_err(ServiceError::from)?);

        let rpc_middleware = RpcServiceBuilder::new().layer_fn(PayloadFormatter::new);

        let server = ServerBuilder::default()
            .max_connections(1024)
            .http_only()
            .set_http_middleware(http_middleware)
            .set_rpc_middleware(rpc_middleware)
            .build(address)
            .await
            .map_err(ServiceError::from)?;

        let address = server.local_addr().map_err(ServiceError::from)?;
        Ok((address, server.start(self.into_rpc())))
    }
}

#[async_trait]
impl CellarAPIServer for CellarServer {
    #[instrument(name = "cellar_health", skip(self))]
    async fn health(&self, _: &Extensions) -> Result<bool, Error> {
        Ok(true)
    }

    #[instrument(name = "cellar_sponsorTransaction", skip(self, ext, params), fields(sender = %params.sender))]
    async fn sponsor_transaction(&self, ext: &Extensions, params: SponsorTransactionRequest) -> Result<SponsorTransactionResponse, Error> {
        let context = RequestContext::new(&self.context, ext);
        instrument_method!(sponsor_transaction_endpoint(&context, params))
    }

    #[instrument(name = "cellar_executeSponsoredTransaction", skip(self, ext, params), fields(digest = %params.digest))]
    async fn execute_sponsored_transaction(&self, ext: &Extensions, params: ExecuteSponsoredRequest) -> Result<ExecuteSponsoredResponse, Error> {
        let context = RequestContext::new(&self.context, ext);
        instrument_method!(execute_sponsored_endpoint(&context, params))
    }

    #[instrument(name = "cellar_mintBottle", skip(self, ext, params), fields(params = %serde_json::to_string(&params).unwrap_or_else(|_| "INVALID_JSON".into())))]
    async fn mint_bottle(&self, ext: &Extensions, params: MintBottleRequest) -> Result<MintBottleResponse, Error> {
        let context = RequestContext::new(&self.context, ext);
        instrument_method!(mint_bottle_endpoint(&context, params))
    }
}
