use crate::limiter::current_core_limit;
use crate::proto::benchmark_service_server::BenchmarkServiceServer;
use crate::transport::benchmark::BenchmarkServiceImpl;
use crate::transport::bytebuf::{ByteBufService, generated::benchmark_service_server};
use crate::transport::{Launcher, Listening, ServeOptions, ShutdownHandle};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::{oneshot, watch};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::transport::server::Router;

/// How long a stopping listener waits for in-flight calls before closing them
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Launches listeners on tonic
///
/// Every listener gets its own thread running a multi-threaded tokio runtime,
/// sized by the process-wide core limit at the moment it starts. The runtime and
/// thread go away when the listener is shut down, at most [`DRAIN_GRACE`] after
/// the stop signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TonicLauncher;

impl TonicLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for TonicLauncher {
    async fn start_server(&self, addr: SocketAddr, options: ServeOptions) -> Result<Listening> {
        let router = server_builder(&options)?
            .add_service(BenchmarkServiceServer::new(BenchmarkServiceImpl::new()));
        serve(addr, router).await
    }

    async fn start_byte_buf_server(
        &self,
        addr: SocketAddr,
        resp_size: usize,
        options: ServeOptions,
    ) -> Result<Listening> {
        let router = server_builder(&options)?.add_service(
            benchmark_service_server::BenchmarkServiceServer::new(ByteBufService::new(resp_size)),
        );
        serve(addr, router).await
    }
}

fn server_builder(options: &ServeOptions) -> Result<Server> {
    let mut builder = Server::builder();
    if let Some(tls) = options.tls.clone() {
        builder = builder
            .tls_config(tls)
            .context("invalid TLS server configuration")?;
    }
    Ok(builder)
}

async fn serve(addr: SocketAddr, router: Router) -> Result<Listening> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let bound = listener.local_addr()?;
    // Re-registered with the listener's own runtime on the server thread
    let listener = listener.into_std()?;

    let workers = current_core_limit();
    spawn_server_thread(bound, move || server_runtime(workers, listener), router).await
}

/// Runtime and listener for one server thread
fn server_runtime(
    workers: NonZeroUsize,
    listener: std::net::TcpListener,
) -> Result<(Runtime, TcpListener)> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers.get())
        .enable_all()
        .build()
        .context("failed to build server runtime")?;
    let listener = {
        let _guard = runtime.enter();
        TcpListener::from_std(listener).context("failed to register listener")?
    };
    tracing::debug!("Serving with {} worker threads", workers);
    Ok((runtime, listener))
}

/// Run `router` on a dedicated thread, returning once it is accepting connections
///
/// `setup` runs on the new thread. Its failure is returned from here rather than
/// leaving a listener that was reported as started but never serves.
async fn spawn_server_thread<S>(bound: SocketAddr, setup: S, router: Router) -> Result<Listening>
where
    S: FnOnce() -> Result<(Runtime, TcpListener)> + Send + 'static,
{
    let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut drain_rx = stop_rx.clone();

    let thread = std::thread::Builder::new()
        .name(format!("benchmark-server-{}", bound.port()))
        .spawn(move || -> Result<()> {
            let (runtime, listener) = match setup() {
                Ok(parts) => parts,
                Err(e) => {
                    // Already handed to the caller through the readiness channel
                    let _ = ready_tx.send(Err(e));
                    return Ok(());
                }
            };
            let _ = ready_tx.send(Ok(()));

            let result = runtime.block_on(async move {
                let serve = router.serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    async move {
                        let _ = stop_rx.changed().await;
                    },
                );
                let deadline = async move {
                    let _ = drain_rx.changed().await;
                    tokio::time::sleep(DRAIN_GRACE).await;
                };

                tokio::select! {
                    result = serve => result.context("benchmark server failed"),
                    () = deadline => {
                        tracing::warn!(
                            "Benchmark server on {} still had calls in flight after {:?}, closing them",
                            bound,
                            DRAIN_GRACE
                        );
                        Ok(())
                    }
                }
            });
            // Aborts connection tasks left behind by an expired drain
            runtime.shutdown_timeout(DRAIN_GRACE);

            match &result {
                Ok(()) => tracing::info!("Benchmark server on {} stopped", bound),
                Err(e) => tracing::error!("Benchmark server on {} stopped: {:#}", bound, e),
            }
            result
        })
        .context("failed to spawn server thread")?;

    ready_rx
        .await
        .map_err(|_| anyhow!("benchmark server thread exited before it was ready"))??;

    let shutdown = ShutdownHandle::new(move || {
        // The server may already have exited on its own, in which case the join
        // below reports why.
        let _ = stop_tx.send(true);
        thread
            .join()
            .map_err(|_| anyhow!("benchmark server thread panicked"))?
    });

    Ok(Listening {
        addr: bound.to_string(),
        shutdown,
    })
}
