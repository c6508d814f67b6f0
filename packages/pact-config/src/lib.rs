mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Ingest, Keyword, Lifecycle, LlmProviderConfig, Postgres,
	Providers, Qdrant, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } =>
			Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

/// Parses, normalizes and validates a configuration document.
pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.max_upload_bytes == 0 {
		return Err(Error::Validation {
			message: "service.max_upload_bytes must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.collection", &cfg.storage.qdrant.collection),
		("storage.keyword.url", &cfg.storage.keyword.url),
		("storage.keyword.index", &cfg.storage.keyword.index),
		("providers.embedding.api_base", &cfg.providers.embedding.api_base),
		("providers.embedding.model", &cfg.providers.embedding.model),
		("providers.llm.api_base", &cfg.providers.llm.api_base),
		("providers.llm.model", &cfg.providers.llm.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.keyword.username.is_some() != cfg.storage.keyword.password.is_some() {
		return Err(Error::Validation {
			message: "storage.keyword.username and storage.keyword.password must be set together."
				.to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.batch_size == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.batch_size must be greater than zero.".to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if cfg.ingest.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "ingest.max_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.extract_prefix_chars == 0 {
		return Err(Error::Validation {
			message: "ingest.extract_prefix_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.max_chunk_chars == 0 {
		return Err(Error::Validation {
			message: "ingest.max_chunk_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.min_chunk_chars > cfg.ingest.max_chunk_chars {
		return Err(Error::Validation {
			message: "ingest.min_chunk_chars must not exceed ingest.max_chunk_chars.".to_string(),
		});
	}

	for (label, weight) in [
		("search.vector_weight", cfg.search.vector_weight),
		("search.keyword_weight", cfg.search.keyword_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if weight < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if cfg.search.vector_weight + cfg.search.keyword_weight <= 0.0 {
		return Err(Error::Validation {
			message: "search.vector_weight and search.keyword_weight must not both be zero."
				.to_string(),
		});
	}
	if cfg.search.top_k == 0 {
		return Err(Error::Validation {
			message: "search.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.party_candidate_limit == 0 {
		return Err(Error::Validation {
			message: "search.party_candidate_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.lifecycle.expiry_sweep_hour_utc > 23 {
		return Err(Error::Validation {
			message: "lifecycle.expiry_sweep_hour_utc must be in the range 0-23.".to_string(),
		});
	}
	if cfg.lifecycle.expiry_poll_interval_seconds == 0 {
		return Err(Error::Validation {
			message: "lifecycle.expiry_poll_interval_seconds must be greater than zero."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for url in [
		&mut cfg.storage.qdrant.url,
		&mut cfg.storage.keyword.url,
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.llm.api_base,
	] {
		let trimmed = url.trim().trim_end_matches('/');

		if trimmed.len() != url.len() {
			*url = trimmed.to_string();
		}
	}

	if cfg.storage.keyword.username.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		cfg.storage.keyword.username = None;
	}
	if cfg.storage.keyword.password.as_deref().map(|pass| pass.is_empty()).unwrap_or(false) {
		cfg.storage.keyword.password = None;
	}
}
