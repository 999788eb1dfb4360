//! TLS credentials for secure benchmark servers
//!
//! Secure servers always use the bundled test certificate. The two files live at
//! fixed paths relative to the worker's root directory, which defaults to the crate
//! directory and can be moved with `BENCHMARK_WORKER_ROOT` when the binary is
//! deployed without its sources.

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tonic::transport::{Identity, ServerTlsConfig};

/// Server certificate, relative to the worker root
pub const CERT_FILE: &str = "testdata/server1.pem";
/// Server private key, relative to the worker root
pub const KEY_FILE: &str = "testdata/server1.key";

const ROOT_ENV: &str = "BENCHMARK_WORKER_ROOT";

/// Resolve a worker-relative path to an absolute one
pub fn abs(relative: impl AsRef<Path>) -> PathBuf {
    let root = std::env::var_os(ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")));
    root.join(relative)
}

/// Load a PEM certificate chain and private key into a server TLS configuration
pub fn load_server_credentials(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<ServerTlsConfig> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let cert = std::fs::read(cert_path)
        .with_context(|| format!("failed to read certificate {}", cert_path.display()))?;
    let key = std::fs::read(key_path)
        .with_context(|| format!("failed to read private key {}", key_path.display()))?;

    ensure_certificates(&cert, cert_path)?;
    ensure_private_key(&key, key_path)?;

    Ok(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
}

// Identity::from_pem defers parsing to the first handshake; bad files surface here.
fn ensure_certificates(pem: &[u8], path: &Path) -> Result<()> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("{} is not a valid PEM certificate chain", path.display()))?;
    if certs.is_empty() {
        return Err(anyhow!("{} contains no certificate", path.display()));
    }
    Ok(())
}

fn ensure_private_key(pem: &[u8], path: &Path) -> Result<()> {
    rustls_pemfile::private_key(&mut &pem[..])
        .with_context(|| format!("{} is not a valid PEM private key", path.display()))?
        .ok_or_else(|| anyhow!("{} contains no private key", path.display()))?;
    Ok(())
}
