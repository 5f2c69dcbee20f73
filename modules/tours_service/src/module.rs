//! Module wiring and serve lifecycle

use crate::api::rest::{routes, AppState};
use crate::config::Config;
use crate::domain::Service;
use crate::infra::storage::{import_seed_file, InMemoryDocumentStore};
use crate::supervisor::{termination_signal, CrashSupervisor, ServerHandle};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Tours service module
pub struct ToursServiceModule {
    config: Arc<Config>,
    store: Arc<InMemoryDocumentStore>,
    service: Arc<Service>,
}

impl ToursServiceModule {
    /// Build the store and domain service
    pub fn init(config: Config) -> Result<Self> {
        let store = Arc::new(InMemoryDocumentStore::new()?);
        let service = Arc::new(Service::new(store.clone()));

        tracing::info!(environment = ?config.environment, "Tours service initialized");
        Ok(Self {
            config: Arc::new(config),
            store,
            service,
        })
    }

    pub fn router(&self) -> axum::Router {
        routes::build_router(AppState {
            service: self.service.clone(),
            config: self.config.clone(),
        })
    }

    /// Serve until a termination signal or an escaped failure stops the server
    pub async fn serve(&self, listener: TcpListener, supervisor: &Arc<CrashSupervisor>) -> Result<()> {
        self.serve_until(listener, supervisor, termination_signal()).await
    }

    /// Serve until `stop` resolves; returning normally means exit code 0
    pub async fn serve_until<S>(
        &self,
        listener: TcpListener,
        supervisor: &Arc<CrashSupervisor>,
        stop: S,
    ) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (handle, drain) = ServerHandle::new();
        supervisor.attach_server(handle.clone())?;

        if let Some(path) = self.config.storage.seed_file.clone() {
            let store = self.store.clone();
            supervisor.spawn_supervised("seed-import", async move {
                let imported = import_seed_file(&store, &path).await?;
                tracing::info!(imported, seed_file = %path.display(), "seed import finished");
                Ok(())
            });
        }

        let signals = handle.clone();
        tokio::spawn(async move {
            stop.await;
            signals.stop_accepting();
        });

        tracing::info!(address = %listener.local_addr()?, "Tours service listening");
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(handle.shutdown_signal())
            .await;
        drain.finished();
        served?;

        tracing::info!("Process terminated!");
        Ok(())
    }
}
