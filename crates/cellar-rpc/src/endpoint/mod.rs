use std::ops::Deref;

use cellar_ledger::Network;
use hyper::http::Extensions;

use crate::context::Context;
use crate::middleware::AdminKey;
use crate::Error;

pub mod execute;
pub mod mint;
pub mod sponsor;

pub struct RequestContext<'a> {
    context: &'a Context,

    pub admin_key: Option<AdminKey>,
}

impl Deref for RequestContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl<'a> RequestContext<'a> {
    pub fn new(ctx: &'a Context, extensions: &Extensions) -> Self {
        Self {
            context: ctx,
            admin_key: extensions.get::<AdminKey>().cloned(),
        }
    }

    #[cfg(test)]
    pub fn empty(ctx: &'a Context) -> Self {
        Self { context: ctx, admin_key: None }
    }

    #[cfg(test)]
    pub fn with_admin_key(ctx: &'a Context, key: &str) -> Self {
        Self {
            context: ctx,
            admin_key: Some(AdminKey::new(key)),
        }
    }

    /// Succeeds when no admin key is configured or when the caller sent the configured one
    pub fn validate_admin_key(&self) -> Result<(), Error> {
        let Some(expected) = self.configuration.admin_key.as_ref().filter(|x| !x.is_empty()) else {
            return Ok(());
        };

        match &self.admin_key {
            Some(key) if key == expected => Ok(()),
            _ => Err(Error::InvalidAdminKey),
        }
    }

    /// Rejects requests naming another network than the one served
    pub fn check_network(&self, network: Option<Network>) -> Result<(), Error> {
        match network {
            Some(network) if network != self.execution.network() => Err(Error::InvalidRequest(format!(
                "network {} is not served, this service runs on {}",
                network,
                self.execution.network()
            ))),
            _ => Ok(()),
        }
    }
}
