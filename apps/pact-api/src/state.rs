use std::sync::Arc;

use pact_service::{PactService, Stores};
use pact_storage::{db::Db, keyword::KeywordStore, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PactService>,
}
impl AppState {
	/// Connects every store and creates missing schema, collection and index before serving.
	pub async fn new(config: pact_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		let keyword = KeywordStore::new(&config.storage.keyword)?;

		keyword.ensure_index().await?;

		let service = PactService::new(config, Stores::new(db, keyword, qdrant));

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: PactService) -> Self {
		Self { service: Arc::new(service) }
	}
}
