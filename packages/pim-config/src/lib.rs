mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, DEFAULT_COLLECTION, Embedding, Mcp, OLLAMA_API_BASE, OPENAI_API_BASE, PriorityWeights,
	Rag, Ranking, Search, Service, Storage,
};

use std::{env, fs, net::SocketAddr, path::Path};

use regex::Regex;

const COLLECTION_SANITIZER: &str = "[^a-z0-9_-]+";

/// Loads the config file when one is given, otherwise starts from built-in defaults. `PIM_*`
/// environment variables are applied on top in both cases.
pub fn load(path: Option<&Path>) -> Result<Config> {
	let cfg = load_unvalidated(path)?;

	validate(&cfg)?;

	Ok(cfg)
}

/// Same as [`load`] but leaves validation to the caller, for callers that layer further
/// overrides on top before validating once.
pub fn load_unvalidated(path: Option<&Path>) -> Result<Config> {
	let mut cfg = match path {
		Some(path) => {
			let raw = fs::read_to_string(path)
				.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

			toml::from_str(&raw)
				.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?
		},
		None => Config::default(),
	};

	apply_overrides(&mut cfg, |key| env::var(key).ok());
	normalize(&mut cfg);

	Ok(cfg)
}

/// Applies `PIM_*` overrides resolved through `lookup`. Unset or empty values are ignored.
pub fn apply_overrides<F>(cfg: &mut Config, lookup: F)
where
	F: Fn(&str) -> Option<String>,
{
	let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

	if let Some(value) = get("PIM_DATA_DIR") {
		cfg.storage.data_dir = value.into();
	}
	if let Some(value) = get("PIM_LOG_LEVEL") {
		cfg.service.log_level = value;
	}
	if let Some(value) = get("PIM_MCP_TRANSPORT") {
		cfg.mcp.transport = value;
	}
	if let Some(value) = get("PIM_RAG_ENABLED") {
		cfg.rag.enabled = matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
	}
	if let Some(value) = get("PIM_RAG_COLLECTION") {
		cfg.rag.collection = value;
	}
	if let Some(value) = get("PIM_QDRANT_URL") {
		cfg.rag.qdrant_url = value;
	}
	if let Some(value) = get("PIM_RAG_EMBEDDING_PROVIDER") {
		cfg.rag.embedding.provider = value;
	}
	if let Some(value) = get("PIM_RAG_EMBEDDING_MODEL") {
		cfg.rag.embedding.model = value;
	}
	if let Some(value) = get("PIM_RAG_EMBEDDING_API_KEY") {
		cfg.rag.embedding.api_key = value;
	}
	if let Some(value) = get("PIM_RAG_EMBEDDING_API_BASE") {
		cfg.rag.embedding.api_base = Some(value);
	}
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.data_dir.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.data_dir must be non-empty.".to_string(),
		});
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	validate_mcp(&cfg.mcp)?;

	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.overfetch_factor == 0 {
		return Err(Error::Validation {
			message: "search.overfetch_factor must be greater than zero.".to_string(),
		});
	}
	if cfg.search.index_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.index_timeout_ms must be greater than zero.".to_string(),
		});
	}

	validate_priority_weights(&cfg.ranking.priority_weights)?;

	if cfg.rag.enabled {
		validate_rag(&cfg.rag)?;
	}

	Ok(())
}

pub fn normalize_collection_name(raw: &str) -> String {
	let lowered = raw.trim().to_lowercase();
	let sanitized = match Regex::new(COLLECTION_SANITIZER) {
		Ok(re) => re.replace_all(&lowered, "-").into_owned(),
		Err(_) => lowered,
	};
	let trimmed = sanitized.trim_matches(|c| c == '-' || c == '_');

	if trimmed.is_empty() { DEFAULT_COLLECTION.to_string() } else { trimmed.to_string() }
}

fn normalize(cfg: &mut Config) {
	if cfg.mcp.auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
		cfg.mcp.auth_token = None;
	}
	if cfg.rag.embedding.api_base.as_deref().map(|base| base.trim().is_empty()).unwrap_or(false) {
		cfg.rag.embedding.api_base = None;
	}
	if cfg.rag.embedding.path.as_deref().map(|path| path.trim().is_empty()).unwrap_or(false) {
		cfg.rag.embedding.path = None;
	}
	if let Some(base) = cfg.rag.embedding.api_base.as_mut() {
		let trimmed = base.trim().trim_end_matches('/').to_string();

		*base = trimmed;
	}

	cfg.mcp.transport = cfg.mcp.transport.trim().to_ascii_lowercase();
	cfg.rag.embedding.provider = cfg.rag.embedding.provider.trim().to_ascii_lowercase();
}

fn validate_mcp(mcp: &Mcp) -> Result<()> {
	if mcp.name.trim().is_empty() {
		return Err(Error::Validation { message: "mcp.name must be non-empty.".to_string() });
	}

	match mcp.transport.as_str() {
		"stdio" => Ok(()),
		"http" => {
			let bind: SocketAddr = mcp.bind.parse().map_err(|_| Error::Validation {
				message: "mcp.bind must be a valid socket address for the http transport."
					.to_string(),
			})?;

			if mcp.auth_token.is_none() && !bind.ip().is_loopback() {
				return Err(Error::Validation {
					message: "mcp.bind must be a loopback address when mcp.auth_token is unset."
						.to_string(),
				});
			}

			Ok(())
		},
		_ => Err(Error::Validation {
			message: "mcp.transport must be one of stdio or http.".to_string(),
		}),
	}
}

fn validate_priority_weights(weights: &PriorityWeights) -> Result<()> {
	let ordered = weights.as_array();

	if ordered.iter().any(|weight| !weight.is_finite()) {
		return Err(Error::Validation {
			message: "ranking.priority_weights must be finite numbers.".to_string(),
		});
	}
	if ordered.iter().any(|weight| *weight <= 0.0) {
		return Err(Error::Validation {
			message: "ranking.priority_weights must be greater than zero.".to_string(),
		});
	}
	if ordered.windows(2).any(|pair| pair[0] <= pair[1]) {
		return Err(Error::Validation {
			message: "ranking.priority_weights must be strictly decreasing from p0 to p3."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_rag(rag: &Rag) -> Result<()> {
	if rag.qdrant_url.trim().is_empty() {
		return Err(Error::Validation {
			message: "rag.qdrant_url must be non-empty when rag.enabled is true.".to_string(),
		});
	}
	if rag.vector_dim == 0 {
		return Err(Error::Validation {
			message: "rag.vector_dim must be greater than zero.".to_string(),
		});
	}
	if !matches!(rag.embedding.provider.as_str(), "openai" | "ollama") {
		return Err(Error::Validation {
			message: "rag.embedding.provider must be one of openai or ollama.".to_string(),
		});
	}
	if rag.embedding.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "rag.embedding.model must be non-empty.".to_string(),
		});
	}
	if rag.embedding.dimensions != rag.vector_dim {
		return Err(Error::Validation {
			message: "rag.embedding.dimensions must match rag.vector_dim.".to_string(),
		});
	}
	if rag.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "rag.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}
