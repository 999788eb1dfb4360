use crate::context::WorkerContext;
use crate::error::{Result, StartError};
use crate::proto::ServerConfig;
use crate::resolver::{PayloadStrategy, resolve};
use crate::stats::{ResetClock, Stats};
use crate::transport::ShutdownHandle;
use anyhow::anyhow;
use std::num::NonZeroUsize;

/// A running benchmark server
///
/// Owns the listener's shutdown handle and the elapsed-time statistics. Stats can
/// be read and reset from any number of threads while the listener keeps serving.
/// Dropping the server stops the listener without waiting for it.
#[derive(Debug)]
pub struct BenchmarkServer {
    port: u16,
    cores: NonZeroUsize,
    addr: String,
    payload: PayloadStrategy,
    secure: bool,
    clock: ResetClock,
    shutdown: ShutdownHandle,
}

impl BenchmarkServer {
    /// Resolve `config` and start serving
    ///
    /// `fallback_port` is used when the config does not name a port; when neither
    /// does, the listener gets an ephemeral port and [`BenchmarkServer::port`]
    /// reports the one actually bound.
    pub async fn start(
        config: &ServerConfig,
        fallback_port: u16,
        ctx: &WorkerContext,
    ) -> Result<Self> {
        let params = resolve(config, fallback_port, ctx)?;
        let secure = params.options.is_secure();
        let addr = params.bind_addr();

        let listening = match params.payload {
            PayloadStrategy::Protobuf => ctx.launcher.start_server(addr, params.options).await,
            PayloadStrategy::ByteBuf { resp_size } => {
                ctx.launcher
                    .start_byte_buf_server(addr, resp_size, params.options)
                    .await
            }
        }
        .map_err(StartError::Fatal)?;

        tracing::info!("benchmark server listening at {}", listening.addr);
        let port = parse_port(&listening.addr)?;

        Ok(Self {
            port,
            cores: params.cores,
            addr: listening.addr,
            payload: params.payload,
            secure,
            clock: ResetClock::new(),
            shutdown: listening.shutdown,
        })
    }

    /// Port the listener is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Core limit this server was started with
    pub fn cores(&self) -> NonZeroUsize {
        self.cores
    }

    /// Address string reported by the transport
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn payload(&self) -> PayloadStrategy {
        self.payload
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Time since start or the last [`BenchmarkServer::reset`]
    pub fn get_stats(&self) -> Stats {
        self.clock.stats()
    }

    /// Restart the elapsed-time measurement
    ///
    /// The listener is unaffected.
    pub fn reset(&self) {
        self.clock.reset();
    }

    /// Stop the listener and wait for it to exit
    pub fn shutdown(self) -> anyhow::Result<()> {
        tracing::info!("Shutting down benchmark server on port {}", self.port);
        self.shutdown.shutdown()
    }
}

/// Port after the last `:` of a bound address such as `0.0.0.0:5005` or `[::]:5005`
pub fn parse_port(addr: &str) -> Result<u16> {
    let port = addr.rsplit(':').next().unwrap_or_default();
    port.parse().map_err(|e| {
        tracing::error!("failed to get port number from server address {}", addr);
        StartError::Fatal(anyhow!(
            "failed to get port number from server address {addr}: {e}"
        ))
    })
}
