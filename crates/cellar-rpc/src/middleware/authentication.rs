use std::fmt::{Debug, Formatter};
use std::task::{Context, Poll};

use jsonrpsee::server::{HttpBody, HttpRequest, HttpResponse};
use serde::Deserialize;
use tower::{Layer, Service};

pub const ADMIN_KEY_HEADER: &str = "x-cellar-admin-key";

/// Key guarding the administrative methods, either configured or sent by a caller
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AdminKey(String);

impl AdminKey {
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for AdminKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminKey(<redacted>)")
    }
}

/// Moves the admin key header into the request extensions
#[derive(Debug, Clone)]
pub struct AuthenticationLayer;

impl<S> Layer<S> for AuthenticationLayer {
    type Service = Authentication<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Authentication { inner }
    }
}

#[derive(Debug, Clone)]
pub struct Authentication<S> {
    inner: S,
}

impl<S> Service<HttpRequest<HttpBody>> for Authentication<S>
where
    S: Service<HttpRequest, Response = HttpResponse<HttpBody>>,
{
    type Error = S::Error;
    type Future = S::Future;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: HttpRequest<HttpBody>) -> Self::Future {
        let admin_key = req
            .headers()
            .get(ADMIN_KEY_HEADER)
            .and_then(|x| x.to_str().ok())
            .map(|x| AdminKey(x.trim().to_string()));

        if let Some(admin_key) = admin_key {
            req.extensions_mut().insert(admin_key);
        }

        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use crate::middleware::AdminKey;

    #[test]
    fn key_is_never_printed() {
        let configured: Option<AdminKey> = serde_json::from_str("\"cellar-admin-42\"").unwrap();

        assert!(!format!("{:?}", configured).contains("cellar-admin-42"));
        assert_eq!(configured.unwrap().as_str(), "cellar-admin-42");
    }
}
