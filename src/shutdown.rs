use crate::publish::EventPublisher;
use crate::{BoxOfficeError, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Graceful shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    components: Arc<Mutex<Vec<Box<dyn ShutdownComponent + Send + Sync>>>>,
    shutdown_timeout: Duration,
}

/// Trait for components that need graceful shutdown
#[async_trait::async_trait]
pub trait ShutdownComponent {
    async fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            components: Arc::new(Mutex::new(Vec::new())),
            shutdown_timeout,
        }
    }

    /// Register a component for graceful shutdown
    pub async fn register_component(&self, component: Box<dyn ShutdownComponent + Send + Sync>) {
        info!("Registering component '{}' for graceful shutdown", component.name());
        self.components.lock().await.push(component);
    }

    /// Get a shutdown signal receiver
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger graceful shutdown
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }

        let components = std::mem::take(&mut *self.components.lock().await);
        let mut shutdown_tasks = Vec::new();

        for component in components {
            shutdown_tasks.push(tokio::spawn(async move {
                let name = component.name().to_string();
                info!("Shutting down component '{}'", name);
                match component.shutdown().await {
                    Ok(()) => info!("Component '{}' shutdown successfully", name),
                    Err(e) => error!("Component '{}' shutdown failed: {}", name, e),
                }
            }));
        }

        let shutdown_future = async {
            for task in shutdown_tasks {
                if let Err(e) = task.await {
                    error!("Shutdown task failed: {}", e);
                }
            }
        };

        match tokio::time::timeout(self.shutdown_timeout, shutdown_future).await {
            Ok(()) => {
                info!("All components shutdown successfully");
                Ok(())
            }
            Err(_) => {
                error!("Shutdown timeout exceeded, forcing exit");
                Err(BoxOfficeError::InvalidArgument(
                    "Shutdown timeout exceeded".to_string(),
                ))
            }
        }
    }

    /// Wait for shutdown signal
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.subscribe();
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Flushes the shared event publisher before exit.
pub struct PublisherShutdown {
    publisher: Arc<dyn EventPublisher>,
}

impl PublisherShutdown {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for PublisherShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing event publisher...");
        self.publisher.flush().await;
        Ok(())
    }

    fn name(&self) -> &str {
        "event-publisher"
    }
}

/// Signal handler for graceful shutdown
pub async fn setup_signal_handlers(coordinator: ShutdownCoordinator) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
            let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        if let Err(e) = coordinator.shutdown().await {
            error!("Graceful shutdown failed: {}", e);
            std::process::exit(1);
        }

        info!("Graceful shutdown completed");
        std::process::exit(0);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag(Arc<AtomicBool>);

    #[async_trait::async_trait]
    impl ShutdownComponent for Flag {
        async fn shutdown(&self) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "flag"
        }
    }

    #[tokio::test]
    async fn shutdown_runs_registered_components_and_signals_subscribers() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let flag = Arc::new(AtomicBool::new(false));
        coordinator.register_component(Box::new(Flag(Arc::clone(&flag)))).await;

        let mut rx = coordinator.subscribe();
        coordinator.shutdown().await.unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert!(rx.try_recv().is_ok());
    }
}
