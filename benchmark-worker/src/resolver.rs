//! Turns a `ServerConfig` record into concrete startup parameters
//!
//! Fields are handled in a fixed order: server type, security, core limit, port,
//! payload. Some fields are accepted only to be reported: the server type (every
//! server is the same tonic server), the async server thread count and the core
//! list.

use crate::context::WorkerContext;
use crate::credentials::load_server_credentials;
use crate::error::{Result, StartError};
use crate::proto::payload_config::Payload;
use crate::proto::{PayloadConfig, ServerConfig, ServerType};
use crate::transport::ServeOptions;
use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;

/// How requests are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStrategy {
    /// Structured messages through the protobuf codec
    Protobuf,
    /// Raw bytes, every call answered with `resp_size` bytes
    ByteBuf { resp_size: usize },
}

/// Validated startup parameters
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub server_type: ServerType,
    pub cores: NonZeroUsize,
    /// Requested port, 0 for an ephemeral one
    pub port: u16,
    pub options: ServeOptions,
    pub payload: PayloadStrategy,
}

impl ResolvedParams {
    /// Address to bind, on all interfaces
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Validate `config` and apply its core limit
///
/// `fallback_port` is used when the config leaves the port at 0.
///
/// # Errors
///
/// - `InvalidArgument` for an unknown server type, an unknown payload config, or a
///   port or response size out of range
/// - `Unimplemented` for complex payload params
/// - `Fatal` when the TLS credentials cannot be loaded
pub fn resolve(
    config: &ServerConfig,
    fallback_port: u16,
    ctx: &WorkerContext,
) -> Result<ResolvedParams> {
    let server_type = ServerType::try_from(config.server_type).map_err(|_| {
        tracing::warn!(
            "Rejecting server config: unknown server type {}",
            config.server_type
        );
        StartError::InvalidArgument(format!("unknown server type: {}", config.server_type))
    })?;
    tracing::info!(
        " * server type: {} (ignored, always starts sync server)",
        server_type.as_str_name()
    );
    tracing::info!(
        " * async server threads: {} (ignored)",
        config.async_server_threads
    );
    tracing::info!(" * core list: {:?} (ignored)", config.core_list);

    tracing::info!(" - security params: {:?}", config.security_params);
    let mut options = ServeOptions::default();
    if config.security_params.is_some() {
        let tls = load_server_credentials(&ctx.cert_path, &ctx.key_path)
            .map_err(|e| StartError::Fatal(e.context("failed to generate credentials")))?;
        options.tls = Some(tls);
    }

    tracing::info!(" - core limit: {}", config.core_limit);
    let cores = core_limit(config.core_limit);
    ctx.limiter.apply(cores);

    tracing::info!(" - port: {}", config.port);
    let port = select_port(config.port, fallback_port)?;

    tracing::info!(" - payload config: {:?}", config.payload_config);
    let payload = payload_strategy(config.payload_config.as_ref())?;

    Ok(ResolvedParams {
        server_type,
        cores,
        port,
        options,
        payload,
    })
}

/// One core unless the config asks for more
pub fn core_limit(requested: i32) -> NonZeroUsize {
    usize::try_from(requested)
        .ok()
        .and_then(NonZeroUsize::new)
        .unwrap_or(NonZeroUsize::MIN)
}

/// Config port, then fallback port, then ephemeral
pub fn select_port(config_port: i32, fallback_port: u16) -> Result<u16> {
    if config_port != 0 {
        return u16::try_from(config_port).map_err(|_| {
            StartError::InvalidArgument(format!("port out of range: {config_port}"))
        });
    }
    Ok(fallback_port)
}

/// Map the payload config variant onto a serving strategy
pub fn payload_strategy(config: Option<&PayloadConfig>) -> Result<PayloadStrategy> {
    let Some(payload_config) = config else {
        // No payload config means a protobuf server
        return Ok(PayloadStrategy::Protobuf);
    };

    match &payload_config.payload {
        Some(Payload::BytebufParams(params)) => {
            let resp_size = usize::try_from(params.resp_size).map_err(|_| {
                StartError::InvalidArgument(format!(
                    "invalid byte buffer response size: {}",
                    params.resp_size
                ))
            })?;
            Ok(PayloadStrategy::ByteBuf { resp_size })
        }
        Some(Payload::SimpleParams(_)) => Ok(PayloadStrategy::Protobuf),
        Some(Payload::ComplexParams(_)) => {
            tracing::warn!("Rejecting server config: complex payload params are not supported");
            Err(StartError::Unimplemented(format!(
                "unsupported payload config: {payload_config:?}"
            )))
        }
        None => {
            tracing::warn!("Rejecting server config: payload config carries no known payload");
            Err(StartError::InvalidArgument(format!(
                "unknown payload config: {payload_config:?}"
            )))
        }
    }
}
