use crate::Result;
use crate::handler::{RowStore, handle};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

/// Local HTTP receiver for realtime deliveries
pub struct ReceiverServer {
    listener: TcpListener,
    store: RowStore,
}

impl ReceiverServer {
    /// Bind the receiver; port 0 picks a free port
    pub async fn bind(addr: SocketAddr, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            store: RowStore::new(output_dir),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    /// Serve until Ctrl+C
    pub async fn run(self) -> Result<RowStore> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C, shutting down...");
        })
        .await
    }

    /// Serve until `shutdown` resolves, then return the store
    pub async fn run_until<F>(self, shutdown: F) -> Result<RowStore>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        tracing::info!(
            "Receiver listening on http://{}, writing to {}",
            addr,
            self.store.output_dir().display()
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    tracing::trace!("Connection from {}", peer);

                    let store = self.store.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req| handle(req, store.clone()));
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            tracing::debug!("Connection from {} ended with error: {}", peer, e);
                        }
                    });
                }
                _ = &mut shutdown => break,
            }
        }

        tracing::info!(
            "Receiver stopped after accepting {} row(s)",
            self.store.accepted()
        );
        Ok(self.store)
    }
}
