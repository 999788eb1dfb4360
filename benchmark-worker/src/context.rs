use crate::credentials::{CERT_FILE, KEY_FILE, abs};
use crate::limiter::{GlobalCoreLimit, RuntimeLimiter};
use crate::transport::Launcher;
use crate::transport::grpc::TonicLauncher;
use std::path::PathBuf;
use std::sync::Arc;

/// Process-level collaborators a benchmark server is started with
///
/// Set up once at process start. Tests build their own with recording limiters
/// and launchers.
#[derive(Clone)]
pub struct WorkerContext {
    pub(crate) limiter: Arc<dyn RuntimeLimiter>,
    pub(crate) launcher: Arc<dyn Launcher>,
    pub(crate) cert_path: PathBuf,
    pub(crate) key_path: PathBuf,
}

impl WorkerContext {
    pub fn new(limiter: Arc<dyn RuntimeLimiter>, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            limiter,
            launcher,
            cert_path: abs(CERT_FILE),
            key_path: abs(KEY_FILE),
        }
    }

    /// Tonic listeners and the process-wide core limit
    pub fn production() -> Self {
        Self::new(Arc::new(GlobalCoreLimit), Arc::new(TonicLauncher::new()))
    }

    /// Use a different certificate and key for secure servers
    pub fn with_credentials(mut self, cert_path: PathBuf, key_path: PathBuf) -> Self {
        self.cert_path = cert_path;
        self.key_path = key_path;
        self
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::production()
    }
}
