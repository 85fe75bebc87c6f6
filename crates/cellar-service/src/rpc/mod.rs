use async_trait::async_trait;
use cellar_common::service::{Error, Service};
use cellar_common::{service_info, service_warn};
use cellar_rpc::server::CellarServer;

use crate::core::context::Context;

pub struct RPCService {
    context: Context,
}

#[async_trait]
impl Service for RPCService {
    type Context = Context;

    const NAME: &'static str = "RPC";

    async fn new(context: Context) -> Self {
        Self { context }
    }

    async fn run(self) -> Result<(), Error> {
        let port = self.context.configuration.rpc.port;

        let server = CellarServer::new(&self.context.into()).map_err(Error::from)?;
        let handle = server.start().await?;
        service_info!("listening on port {}", port);

        handle.stopped().await;
        service_warn!("server on port {} stopped", port);

        Err(Error::new("rpc server stopped unexpectedly"))
    }
}
