use time::OffsetDateTime;

use crate::{PactService, Result};

impl PactService {
	/// Flips overdue contracts to expired and mirrors the change into both indexes.
	///
	/// The relational store is authoritative. Index updates are best effort and only logged on
	/// failure.
	pub async fn expire_contracts(&self, now: OffsetDateTime) -> Result<usize> {
		let expired = self.stores.contracts.expire_due(now).await?;

		if expired.is_empty() {
			tracing::debug!("No contracts due for expiry.");

			return Ok(0);
		}

		if let Err(err) = self.stores.keyword.mark_expired(&expired).await {
			tracing::error!(count = expired.len(), error = %err, "Failed to mirror expiry into keyword index.");
		}
		if let Err(err) = self.stores.vector.mark_expired(&expired).await {
			tracing::error!(count = expired.len(), error = %err, "Failed to mirror expiry into vector index.");
		}

		tracing::info!(count = expired.len(), "Expired contracts.");

		Ok(expired.len())
	}
}
