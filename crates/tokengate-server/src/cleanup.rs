//! Periodic removal of expired authorization codes and assertion IDs.

use std::sync::Arc;
use std::time::Duration;

use tokengate_auth::AuthResult;
use tokengate_auth::storage::{AuthorizationCodeStorage, JtiStorage};

/// Sweeps the stores that only grow on their own.
pub struct StorageSweeper {
    codes: Arc<dyn AuthorizationCodeStorage>,
    jti: Arc<dyn JtiStorage>,
    interval: Duration,
}

impl StorageSweeper {
    pub fn new(
        codes: Arc<dyn AuthorizationCodeStorage>,
        jti: Arc<dyn JtiStorage>,
        interval: Duration,
    ) -> Self {
        Self {
            codes,
            jti,
            interval,
        }
    }

    /// Deletes expired entries from both stores.
    ///
    /// Returns the number of codes and assertion IDs deleted.
    pub async fn sweep(&self) -> AuthResult<(u64, u64)> {
        let codes = self.codes.cleanup_expired().await?;
        let jti = self.jti.cleanup_expired().await?;
        Ok((codes, jti))
    }

    /// Start background cleanup task
    ///
    /// The task runs until its handle is aborted.
    pub fn start_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                interval.tick().await;

                match self.sweep().await {
                    Ok((codes, jti)) if codes + jti > 0 => {
                        tracing::debug!(codes, jti, "Expired storage entries removed");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Storage cleanup failed");
                    }
                    _ => {}
                }
            }
        })
    }
}
