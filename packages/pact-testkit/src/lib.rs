//! Scratch stores for tests that talk to live Postgres, Qdrant or Elasticsearch.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, sync::Mutex, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

/// A uniquely named database created from a base DSN, plus the Qdrant collections and keyword
/// indexes handed out under the same name. Everything is dropped on cleanup or on drop.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	cleaned: bool,
	collections: Mutex<Vec<String>>,
	keyword_indexes: Mutex<Vec<String>>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse PACT_PG_DSN: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("pact_test_{}", Uuid::new_v4().simple());

		admin_conn
			.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.clone().database(&name).to_url_lossy().to_string();

		Ok(Self {
			name,
			dsn,
			admin_options,
			cleaned: false,
			collections: Mutex::new(Vec::new()),
			keyword_indexes: Mutex::new(Vec::new()),
		})
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn collection_name(&self, prefix: &str) -> String {
		track(&self.collections, format!("{prefix}_{}", self.name))
	}

	/// Elasticsearch index names must be lowercase, which the generated name already is.
	pub fn keyword_index_name(&self, prefix: &str) -> String {
		track(&self.keyword_indexes, format!("{prefix}_{}", self.name))
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner().await
	}

	async fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		let collections = snapshot(&self.collections);
		let indexes = snapshot(&self.keyword_indexes);
		let qdrant_result = cleanup_qdrant_collections(&collections).await;
		let keyword_result = cleanup_keyword_indexes(&indexes).await;

		cleanup_database(&self.name, &self.admin_options).await?;
		qdrant_result?;
		keyword_result?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();
		let collections = snapshot(&self.collections);
		let indexes = snapshot(&self.keyword_indexes);
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test database cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(cleanup_qdrant_collections(&collections)) {
				eprintln!("Test Qdrant cleanup failed: {err}.");
			}
			if let Err(err) = runtime.block_on(cleanup_keyword_indexes(&indexes)) {
				eprintln!("Test keyword index cleanup failed: {err}.");
			}
			if let Err(err) = runtime.block_on(cleanup_database(&name, &admin_options)) {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("PACT_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("PACT_QDRANT_URL").ok()
}

pub fn env_keyword_url() -> Option<String> {
	env::var("PACT_ES_URL").ok()
}

fn track(names: &Mutex<Vec<String>>, name: String) -> String {
	let mut tracked = names.lock().unwrap_or_else(|err| err.into_inner());

	if !tracked.contains(&name) {
		tracked.push(name.clone());
	}

	name
}

fn snapshot(names: &Mutex<Vec<String>>) -> Vec<String> {
	names.lock().unwrap_or_else(|err| err.into_inner()).clone()
}

async fn connect_admin(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn cleanup_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options).await.map_err(|err| {
		Error::Message(format!("Failed to connect to admin database for cleanup: {err}."))
	})?;
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.await
		.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

	Ok(())
}

async fn cleanup_qdrant_collections(collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let Some(qdrant_url) = env_qdrant_url() else {
		eprintln!("Skipping Qdrant cleanup; set PACT_QDRANT_URL to delete test collections.");

		return Ok(());
	};
	let client = Qdrant::from_url(&qdrant_url).build()?;

	for collection in collections {
		time::timeout(Duration::from_secs(10), client.delete_collection(collection.clone()))
			.await
			.map_err(|_| {
				Error::Message(format!("Timed out deleting Qdrant collection {collection:?}."))
			})??;
	}

	Ok(())
}

async fn cleanup_keyword_indexes(indexes: &[String]) -> Result<()> {
	if indexes.is_empty() {
		return Ok(());
	}

	let Some(base_url) = env_keyword_url() else {
		eprintln!("Skipping keyword index cleanup; set PACT_ES_URL to delete test indexes.");

		return Ok(());
	};
	let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;

	for index in indexes {
		let res = client.delete(format!("{}/{index}", base_url.trim_end_matches('/'))).send().await?;

		if !res.status().is_success() && res.status() != reqwest::StatusCode::NOT_FOUND {
			return Err(Error::Message(format!(
				"Failed to delete keyword index {index:?}: {}.",
				res.status()
			)));
		}
	}

	Ok(())
}
