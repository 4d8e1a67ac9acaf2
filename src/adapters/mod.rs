pub mod memory;
pub mod record;

use async_trait::async_trait;
pub use record::*;

use crate::{error::Error, scan::ScanRequest};

/// -----------------------------
/// Store contract
/// -----------------------------

/// The store client a scan is executed against.
///
/// Implementations own transport, retries, timeouts and throttling. A failed
/// call should be reported as [`Error::Store`] so the caller receives it as is.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn scan(&self, request: ScanRequest) -> Result<ScanOutput, Error>;
}
