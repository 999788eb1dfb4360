//! Transport layer for benchmark servers
//!
//! The resolver decides *what* to serve; a [`Launcher`] decides *how*. Both
//! payload strategies are served over gRPC at the same
//! `grpc.testing.BenchmarkService` routes:
//!
//! - [`benchmark`]: protobuf messages through the standard prost codec
//! - [`bytebuf`]: raw byte sequences, bypassing (de)serialization entirely
//!
//! [`grpc::TonicLauncher`] is the production launcher. Tests substitute launchers
//! that record what they were asked to start.

pub mod benchmark;
pub mod bytebuf;
pub mod grpc;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use tonic::transport::ServerTlsConfig;

/// Options shared by both server flavours
#[derive(Clone, Default)]
pub struct ServeOptions {
    /// Serve over TLS with these credentials, plaintext when `None`
    pub tls: Option<ServerTlsConfig>,
}

impl ServeOptions {
    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }
}

impl fmt::Debug for ServeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeOptions")
            .field("secure", &self.is_secure())
            .finish()
    }
}

/// A listener that is accepting connections
#[derive(Debug)]
pub struct Listening {
    /// Address actually bound, e.g. `0.0.0.0:41235`
    pub addr: String,
    /// Stops the listener
    pub shutdown: ShutdownHandle,
}

/// Stops a running listener
///
/// Consumed by [`ShutdownHandle::shutdown`], so a listener can only be stopped once.
pub struct ShutdownHandle {
    stop: Box<dyn FnOnce() -> Result<()> + Send + Sync>,
}

impl ShutdownHandle {
    pub fn new(stop: impl FnOnce() -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            stop: Box::new(stop),
        }
    }

    /// Stop accepting connections and wait for the listener to wind down
    ///
    /// Blocks the calling thread while in-flight calls drain. Calls still open after
    /// the launcher's grace period are cut off.
    pub fn shutdown(self) -> Result<()> {
        (self.stop)()
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShutdownHandle")
    }
}

/// Starts benchmark listeners
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start a protobuf BenchmarkService
    async fn start_server(&self, addr: SocketAddr, options: ServeOptions) -> Result<Listening>;

    /// Start a byte-buffer BenchmarkService answering every call with `resp_size` bytes
    async fn start_byte_buf_server(
        &self,
        addr: SocketAddr,
        resp_size: usize,
        options: ServeOptions,
    ) -> Result<Listening>;
}
