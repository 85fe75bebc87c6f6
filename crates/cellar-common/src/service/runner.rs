use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info};
use tokio::time;

use crate::service::{Error, Service};

const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Spawns [`Service`] instances and keeps them alive.
///
/// Each service runs on its own OS thread with a dedicated Tokio runtime, so tasks spawned by
/// one service never compete with another service's executor.
pub struct ServiceManager<C> {
    context: C,

    services: Vec<JoinHandle<()>>,
}

impl<C> ServiceManager<C>
where
    C: 'static + Clone + Send,
{
    pub fn new(context: C) -> Self {
        Self { context, services: vec![] }
    }

    /// Spawn a service bound to a clone of the manager context. The service is rebuilt
    /// whenever it stops.
    pub fn spawn<T: Service<Context = C>>(&mut self) {
        let ctx = self.context.clone();

        self.services.push(thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(target: T::NAME, "could not build runtime {}", err);
                    return;
                },
            };

            runtime.block_on(async move {
                loop {
                    let service = T::new(ctx.clone()).await;

                    info!(target: T::NAME, "starting service");
                    if let Err(err) = service.run().await {
                        error!(target: T::NAME, "service terminated with error {} - restarting in 5sec", err);
                        time::sleep(RESTART_DELAY).await;
                    }
                }
            })
        }))
    }

    pub fn spawn_conditional<T: Service<Context = C>>(&mut self, condition: bool) {
        if condition {
            self.spawn::<T>()
        }
    }

    /// Blocks the current thread until one of the services exits
    pub fn wait(&mut self) -> Result<(), Error> {
        if let Some(service) = self.services.pop() {
            let _ = service.join();
            return Err(Error::new("service manager error"));
        }

        Ok(())
    }
}
