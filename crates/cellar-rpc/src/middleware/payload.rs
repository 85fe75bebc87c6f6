use std::borrow::Cow;

use futures::future::BoxFuture;
use jsonrpsee::server::middleware::rpc::RpcServiceT;
use jsonrpsee::types::Request;
use jsonrpsee::MethodResponse;

/// Accepts parameters given by name: every method takes a single request object, so an
/// object payload is wrapped into a one element array before dispatch.
#[derive(Clone)]
pub struct PayloadFormatter<S> {
    service: S,
}

impl<S> PayloadFormatter<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

fn positional(mut request: Request<'_>) -> Request<'_> {
    let Some(params) = request.params.clone() else {
        return request;
    };

    if params.get().trim_start().starts_with('[') {
        return request;
    }

    if let Ok(payload) = serde_json::value::to_raw_value(&[params]) {
        request.params = Some(Cow::Owned(payload));
    }

    request
}

impl<'a, S> RpcServiceT<'a> for PayloadFormatter<S>
where
    S: RpcServiceT<'a> + Send + Sync + Clone + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, request: Request<'a>) -> Self::Future {
        let service = self.service.clone();
        let request = positional(request);

        Box::pin(async move { service.call(request).await })
    }
}
