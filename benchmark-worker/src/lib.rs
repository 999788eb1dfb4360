//! # Benchmark Worker
//!
//! The server half of a gRPC benchmark worker. Given a `grpc.testing.ServerConfig`
//! record it brings up a `BenchmarkService` listener, then reports how much wall
//! time has passed since the last stats reset.
//!
//! ## Starting a Server
//!
//! ```no_run
//! use benchmark_worker::{BenchmarkServer, WorkerContext, proto::ServerConfig};
//!
//! # async fn run() -> Result<(), benchmark_worker::StartError> {
//! let ctx = WorkerContext::production();
//! let config = ServerConfig {
//!     port: 5005,
//!     core_limit: 2,
//!     ..Default::default()
//! };
//!
//! let server = BenchmarkServer::start(&config, 0, &ctx).await?;
//! println!("listening on port {}", server.port());
//!
//! // ... drive load against the server ...
//!
//! let stats = server.get_stats();
//! println!("{:.3}s since start", stats.time_elapsed);
//! server.reset();
//! # Ok(())
//! # }
//! ```
//!
//! ## How a Config Is Resolved
//!
//! | Field               | Handling                                                   |
//! |---------------------|------------------------------------------------------------|
//! | server type         | Reported only; unknown values are rejected                 |
//! | security params     | Present: TLS with the bundled test certificate             |
//! | core limit          | 0 means 1; applied process-wide                            |
//! | port                | Config port, else fallback port, else ephemeral            |
//! | payload config      | None/simple: protobuf; bytebuf: raw bytes; complex: error  |
//!
//! ## Errors
//!
//! [`StartError::InvalidArgument`] and [`StartError::Unimplemented`] mean the
//! config record was bad and map onto the matching gRPC status codes.
//! [`StartError::Fatal`] means the environment is broken (credentials missing,
//! listener cannot bind) and the worker binary exits instead of reporting it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ ServerConfig │────▶│   Resolver   │────▶│   Launcher   │
//! └──────────────┘     └──────┬───────┘     └──────┬───────┘
//!                             │ core limit         │ addr + shutdown
//!                      ┌──────▼───────┐     ┌──────▼───────┐
//!                      │RuntimeLimiter│     │BenchmarkServer│
//!                      └──────────────┘     │ (ResetClock) │
//!                                           └──────────────┘
//! ```

pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod limiter;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod transport;

/// Generated `grpc.testing` messages and the protobuf BenchmarkService
pub mod proto {
    tonic::include_proto!("grpc.testing");
}

pub use context::WorkerContext;
pub use error::StartError;
pub use resolver::{PayloadStrategy, ResolvedParams};
pub use server::BenchmarkServer;
pub use stats::Stats;
