pub mod client;
pub mod error;
mod params;
mod record;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use client::SearchClient;
pub use error::SearchError;
pub use params::*;
pub use record::ReliefCenterRecord;

/// Anything that can answer a relief-center lookup for one params snapshot.
///
/// Implementations report every failure as a `SearchError`; an empty `Vec`
/// means the lookup succeeded and matched nothing.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn fetch_relief_centers(
        &self,
        params: &SearchParams,
        cancel: CancellationToken,
    ) -> Result<Vec<ReliefCenterRecord>, SearchError>;
}
