pub mod fallback;
pub mod monitoring;

use async_trait::async_trait;
use thiserror::Error;

mod runner;

pub use runner::ServiceManager;
pub use tracing;

#[macro_export]
macro_rules! log_if_error {
    ($e: expr) => {
        match $e {
            Ok(v) => Ok(v),
            Err(e) => {
                $crate::service::tracing::error!("{}", e);
                Err(e)
            },
        }
    };
}

/// Logs a message with the name of the current [`Service`] as target.
///
/// ```rust
/// use cellar_common::service::{Error, Service};
/// use cellar_common::service_info;
///
/// pub struct Ledger;
///
/// impl Service for Ledger {
///     const NAME: &'static str = "Ledger";
///     type Context = ();
///
///     async fn new(context: Self::Context) -> Self { todo!() }
///
///     async fn run(self) -> Result<(), Error> {
///         service_info!("connected"); // prints `[Ledger] connected`
///         Ok(())
///     }
/// }
/// ```
#[macro_export]
macro_rules! service_info {
    ($s: literal $(, $v: expr)*) => {
        $crate::log::info!(target: <Self>::NAME , $s, $($v),*);
    };
}

/// See [`service_info`]
#[macro_export]
macro_rules! service_warn {
    ($s: literal $(, $v: expr)*) => {
        $crate::log::warn!(target: <Self>::NAME , $s, $($v),*);
    };
}

/// See [`service_info`]
#[macro_export]
macro_rules! service_error {
    ($s: literal $(, $v: expr)*) => {
        $crate::log::error!(target: <Self>::NAME , $s, $($v),*);
    };
}

/// Unwraps the value when it is `Ok`, otherwise logs the error under the service name
/// and evaluates the fallback expression.
#[macro_export]
macro_rules! service_check {
    ($v: expr) => {
        $crate::service_check!($v => {});
    };
    ($v: expr => $e: expr) => {
        match $v {
            Ok(v) => v,
            Err(e) => {
                $crate::service_error!("{}", e);
                $e
            },
        }
    };
}

#[derive(Error, Debug)]
#[error("{0}")]
pub struct Error(String);

impl Error {
    pub fn new(s: &str) -> Error {
        Error(s.to_string())
    }

    pub fn from<E: std::error::Error>(e: E) -> Self {
        Self(e.to_string())
    }
}

/// A long running unit of the process with its own lifecycle.
///
/// Services are registered on a [`ServiceManager`] which builds them from a shared
/// [`Service::Context`] and restarts them when [`Service::run`] returns an error.
#[async_trait]
pub trait Service {
    const NAME: &'static str;
    type Context: Clone + Send;

    async fn new(context: Self::Context) -> Self;

    /// Runs the service. Returning means the service stopped, in which case the manager
    /// builds a fresh instance and runs it again.
    async fn run(self) -> Result<(), Error>;
}
