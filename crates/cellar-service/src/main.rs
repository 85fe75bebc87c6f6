use cellar_common::service::monitoring::Metric;
use cellar_common::service::{Error, ServiceManager};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Registry;

use crate::core::context::Context;
use crate::core::Fmt;
use crate::rpc::RPCService;

mod core;
mod rpc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let context = Context::load()?;

    let metric_layer = context.configuration.prometheus.as_ref().map(Metric::layer).transpose().map_err(Error::from)?;
    let fmt_layer = Fmt::layer(&context.configuration.verbosity);

    Registry::default().with(fmt_layer).with(metric_layer).try_init().map_err(Error::from)?;

    let mut services = ServiceManager::new(context);
    info!("starting services...");
    services.spawn::<RPCService>();

    info!("all services started");
    services.wait()
}
