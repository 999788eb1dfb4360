//! Worker configuration and CLI argument parsing
//!
//! The benchmark server configuration can come from three places:
//! - Command-line arguments
//! - Environment variables (with BENCHMARK_WORKER_ prefix)
//! - A JSON file in the proto3 JSON shape of `grpc.testing.ServerConfig`
//!
//! # Configuration Priority
//!
//! 1. `--config <file>` replaces every server flag when given
//! 2. CLI arguments
//! 3. Environment variables
//! 4. Default values
//!
//! # Example Usage
//!
//! ```bash
//! # Protobuf server on an ephemeral port
//! benchmark-worker
//!
//! # Byte-buffer server answering with 1 KiB on port 5005, over TLS
//! benchmark-worker --port 5005 --payload bytebuf --resp-size 1024 --secure
//!
//! # Server config from a scenario file
//! benchmark-worker --config scenario_server.json
//! ```

use crate::proto::payload_config::Payload;
use crate::proto::{
    ByteBufferParams, ComplexProtoParams, PayloadConfig, SecurityParams, ServerConfig,
    ServerType, SimpleProtoParams,
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Everything the worker binary needs to run one benchmark server
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration handed to the resolver
    pub server: ServerConfig,
    /// Port used when the server configuration leaves it at 0
    pub fallback_port: u16,
    /// How often to report and reset stats, `None` to stay quiet
    pub stats_interval: Option<Duration>,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Payload strategy as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// No payload config at all
    Protobuf,
    /// Byte-buffer params
    Bytebuf,
    /// Simple protobuf params
    Simple,
    /// Complex protobuf params (rejected by the server)
    Complex,
}

impl std::str::FromStr for PayloadKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "protobuf" => Ok(PayloadKind::Protobuf),
            "bytebuf" => Ok(PayloadKind::Bytebuf),
            "simple" => Ok(PayloadKind::Simple),
            "complex" => Ok(PayloadKind::Complex),
            _ => Err(anyhow!(
                "Invalid payload: {}. Valid options are: protobuf, bytebuf, simple, complex",
                s
            )),
        }
    }
}

/// Parse a server type by its proto name or a short alias
fn parse_server_type(s: &str) -> Result<ServerType> {
    match s.to_lowercase().as_str() {
        "sync" => Ok(ServerType::SyncServer),
        "async" => Ok(ServerType::AsyncServer),
        "async-generic" => Ok(ServerType::AsyncGenericServer),
        _ => ServerType::from_str_name(&s.to_uppercase()).ok_or_else(|| {
            anyhow!(
                "Invalid server type: {}. Valid options are: sync, async, async-generic",
                s
            )
        }),
    }
}

/// Command-line arguments for the worker
///
/// All arguments can also be set via environment variables with the
/// BENCHMARK_WORKER_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "benchmark-worker",
    about = "gRPC benchmark worker server",
    long_about = "Starts one gRPC benchmark server and reports elapsed-time stats.\n\nEnvironment variables with BENCHMARK_WORKER_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    #[arg(
        long,
        value_name = "FILE",
        help = "Load the server config from a JSON file instead of flags",
        env = "BENCHMARK_WORKER_CONFIG"
    )]
    pub config: Option<PathBuf>,

    // Server config
    #[arg(
        long,
        value_name = "TYPE",
        help = "Server type: sync, async, async-generic (reported only)",
        default_value = "sync",
        value_parser = parse_server_type,
        env = "BENCHMARK_WORKER_SERVER_TYPE"
    )]
    pub server_type: ServerType,
    #[arg(
        long,
        value_name = "PORT",
        help = "Port to listen on, 0 to use the fallback port",
        default_value_t = 0,
        env = "BENCHMARK_WORKER_PORT"
    )]
    pub port: u16,
    #[arg(
        long,
        value_name = "PORT",
        help = "Port used when no port is configured, 0 for an ephemeral port",
        default_value_t = 0,
        env = "BENCHMARK_WORKER_FALLBACK_PORT"
    )]
    pub fallback_port: u16,
    #[arg(
        long,
        value_name = "N",
        help = "Number of cores to limit the server to, 0 for one core",
        default_value_t = 0,
        env = "BENCHMARK_WORKER_CORE_LIMIT"
    )]
    pub core_limit: u32,
    #[arg(
        long,
        help = "Serve over TLS with the bundled test certificate",
        env = "BENCHMARK_WORKER_SECURE"
    )]
    pub secure: bool,
    #[arg(
        long,
        value_name = "KIND",
        help = "Payload: protobuf, bytebuf, simple, complex",
        default_value = "protobuf",
        env = "BENCHMARK_WORKER_PAYLOAD"
    )]
    pub payload: PayloadKind,
    #[arg(
        long,
        value_name = "BYTES",
        help = "Response size for bytebuf and simple payloads",
        default_value_t = 0,
        env = "BENCHMARK_WORKER_RESP_SIZE"
    )]
    pub resp_size: u32,

    // General options
    #[arg(
        long,
        value_name = "SECS",
        help = "Report and reset stats every SECS seconds, 0 to disable",
        default_value_t = 0,
        env = "BENCHMARK_WORKER_STATS_INTERVAL"
    )]
    pub stats_interval: u64,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "BENCHMARK_WORKER_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if a value
    /// fails validation.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let server = match &args.config {
            Some(path) => load_server_config(path)?,
            None => server_config_from_args(&args)?,
        };

        let config = Config {
            server,
            fallback_port: args.fallback_port,
            stats_interval: (args.stats_interval > 0)
                .then(|| Duration::from_secs(args.stats_interval)),
            log_level: args.log_level.to_lowercase(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Valid options are: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }
        Ok(())
    }

    fn print_env_vars() {
        println!("Benchmark Worker Environment Variables");
        println!("======================================");
        println!();
        println!("All environment variables use the BENCHMARK_WORKER_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Server Configuration:");
        println!("  BENCHMARK_WORKER_CONFIG=<file>         JSON server config, replaces the flags below");
        println!("  BENCHMARK_WORKER_SERVER_TYPE=<type>    sync, async, async-generic [default: sync]");
        println!("  BENCHMARK_WORKER_PORT=<port>           Listen port [default: 0]");
        println!("  BENCHMARK_WORKER_FALLBACK_PORT=<port>  Port used when none is configured [default: 0]");
        println!("  BENCHMARK_WORKER_CORE_LIMIT=<n>        Core limit, 0 for one core [default: 0]");
        println!("  BENCHMARK_WORKER_SECURE=true|false     Serve over TLS");
        println!("  BENCHMARK_WORKER_PAYLOAD=<kind>        protobuf, bytebuf, simple, complex [default: protobuf]");
        println!("  BENCHMARK_WORKER_RESP_SIZE=<bytes>     Response size [default: 0]");
        println!("  BENCHMARK_WORKER_ROOT=<dir>            Directory holding testdata/server1.{{pem,key}}");
        println!();

        println!("General Configuration:");
        println!("  BENCHMARK_WORKER_STATS_INTERVAL=<secs> Stats report interval, 0 disables [default: 0]");
        println!(
            "  BENCHMARK_WORKER_LOG_LEVEL=<level>     Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Byte-buffer server on port 5005");
        println!("  export BENCHMARK_WORKER_PORT=5005");
        println!("  export BENCHMARK_WORKER_PAYLOAD=bytebuf");
        println!("  export BENCHMARK_WORKER_RESP_SIZE=1024");
        println!();
        println!("  # Run worker (CLI args override env vars)");
        println!("  benchmark-worker --port 6006  # Will use port 6006, not 5005");
    }
}

fn server_config_from_args(args: &Args) -> Result<ServerConfig> {
    let resp_size = i32::try_from(args.resp_size).context("response size too large")?;
    let payload = match args.payload {
        PayloadKind::Protobuf => None,
        PayloadKind::Bytebuf => Some(Payload::BytebufParams(ByteBufferParams {
            req_size: 0,
            resp_size,
        })),
        PayloadKind::Simple => Some(Payload::SimpleParams(SimpleProtoParams {
            req_size: 0,
            resp_size,
        })),
        PayloadKind::Complex => Some(Payload::ComplexParams(ComplexProtoParams {})),
    };

    Ok(ServerConfig {
        server_type: args.server_type as i32,
        security_params: args.secure.then(SecurityParams::default),
        port: i32::from(args.port),
        core_limit: i32::try_from(args.core_limit).context("core limit too large")?,
        payload_config: payload.map(|payload| PayloadConfig {
            payload: Some(payload),
        }),
        ..Default::default()
    })
}

/// Load a server config written in proto3 JSON form
pub fn load_server_config(path: &Path) -> Result<ServerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_server_config(&contents)
        .with_context(|| format!("invalid config file {}", path.display()))
}

/// Parse a proto3 JSON `ServerConfig`
///
/// Enum fields accept either the value name or its number. Numbers are passed
/// through unchecked so the server reports unknown values itself.
pub fn parse_server_config(json: &str) -> Result<ServerConfig> {
    let file: ServerConfigJson = serde_json::from_str(json)?;
    file.try_into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerConfigJson {
    #[serde(default)]
    server_type: Option<EnumValue>,
    #[serde(default)]
    security_params: Option<SecurityParamsJson>,
    #[serde(default)]
    port: i32,
    #[serde(default)]
    async_server_threads: i32,
    #[serde(default)]
    core_limit: i32,
    #[serde(default)]
    payload_config: Option<PayloadConfigJson>,
    #[serde(default)]
    core_list: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnumValue {
    Number(i32),
    Name(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecurityParamsJson {
    #[serde(default)]
    use_test_ca: bool,
    #[serde(default)]
    server_host_override: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadConfigJson {
    #[serde(default)]
    bytebuf_params: Option<SizeParamsJson>,
    #[serde(default)]
    simple_params: Option<SizeParamsJson>,
    #[serde(default)]
    complex_params: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SizeParamsJson {
    #[serde(default)]
    req_size: i32,
    #[serde(default)]
    resp_size: i32,
}

impl TryFrom<ServerConfigJson> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(file: ServerConfigJson) -> Result<Self> {
        let server_type = match file.server_type {
            None => ServerType::SyncServer as i32,
            Some(EnumValue::Number(n)) => n,
            Some(EnumValue::Name(name)) => ServerType::from_str_name(&name)
                .ok_or_else(|| anyhow!("unknown server type name: {name}"))?
                as i32,
        };

        let payload_config = file.payload_config.map(PayloadConfig::try_from).transpose()?;

        Ok(ServerConfig {
            server_type,
            security_params: file.security_params.map(|p| SecurityParams {
                use_test_ca: p.use_test_ca,
                server_host_override: p.server_host_override,
            }),
            port: file.port,
            async_server_threads: file.async_server_threads,
            core_limit: file.core_limit,
            payload_config,
            core_list: file.core_list,
        })
    }
}

impl TryFrom<PayloadConfigJson> for PayloadConfig {
    type Error = anyhow::Error;

    fn try_from(json: PayloadConfigJson) -> Result<Self> {
        let payload = match (json.bytebuf_params, json.simple_params, json.complex_params) {
            (None, None, None) => None,
            (Some(p), None, None) => Some(Payload::BytebufParams(ByteBufferParams {
                req_size: p.req_size,
                resp_size: p.resp_size,
            })),
            (None, Some(p), None) => Some(Payload::SimpleParams(SimpleProtoParams {
                req_size: p.req_size,
                resp_size: p.resp_size,
            })),
            (None, None, Some(_)) => Some(Payload::ComplexParams(ComplexProtoParams {})),
            _ => return Err(anyhow!("payloadConfig must set at most one payload")),
        };
        Ok(PayloadConfig { payload })
    }
}
