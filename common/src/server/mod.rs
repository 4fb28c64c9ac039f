use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::warn;

use crate::err::ReError;

/// Anything with an async start/shutdown lifecycle: the connection-accept
/// loop, a data source that owns background resources, etc.
#[async_trait::async_trait]
pub trait Server: Send {
    async fn start(&mut self) -> Result<(), ReError>;

    async fn shutdown(&mut self, graceful: bool) -> Result<(), ReError>;
}

/// Tracks a set of `Server`s and shuts them all down together, once, even if
/// the handle is dropped without an explicit shutdown call.
pub struct ShutdownHandle {
    shutdown: Arc<AtomicBool>,
    services: Vec<Box<dyn Server>>,
}

impl ShutdownHandle {
    pub fn create() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            services: vec![],
        }
    }

    pub fn add_service(&mut self, server: Box<dyn Server>) {
        self.services.push(server);
    }

    pub async fn shutdown_services(&mut self, graceful: bool) -> Result<(), ReError> {
        if self
            .shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        let mut futures = vec![];
        for s in &mut self.services {
            futures.push(s.shutdown(graceful));
        }
        let results = join_all(futures).await;
        results
            .into_iter()
            .find(|r| r.is_err())
            .unwrap_or(Ok(()))
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::SeqCst) {
            warn!("ShutdownHandle dropped without explicit shutdown; services may leak");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Noop(bool);

    #[async_trait::async_trait]
    impl Server for Noop {
        async fn start(&mut self) -> Result<(), ReError> {
            Ok(())
        }
        async fn shutdown(&mut self, _graceful: bool) -> Result<(), ReError> {
            self.0 = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut handle = ShutdownHandle::create();
        handle.add_service(Box::new(Noop(false)));
        handle.shutdown_services(true).await.unwrap();
        handle.shutdown_services(true).await.unwrap();
    }
}
