use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_COLLECTION: &str = "pim-context";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const OPENAI_PATH: &str = "/embeddings";
pub const OLLAMA_API_BASE: &str = "http://localhost:11434/api";
pub const OLLAMA_PATH: &str = "/embed";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub mcp: Mcp,
	pub rag: Rag,
	pub search: Search,
	pub ranking: Ranking,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
	pub data_dir: PathBuf,
}
impl Storage {
	/// One JSON document per Stock lives here.
	pub fn stocks_dir(&self) -> PathBuf {
		self.data_dir.join("stocks")
	}

	pub fn states_db_path(&self) -> PathBuf {
		self.data_dir.join("states.db")
	}
}
impl Default for Storage {
	fn default() -> Self {
		Self { data_dir: PathBuf::from("data") }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Mcp {
	pub name: String,
	/// `stdio` or `http`.
	pub transport: String,
	/// Socket address for the `http` transport.
	pub bind: String,
	/// Optional Bearer token required by the `http` transport.
	pub auth_token: Option<String>,
}
impl Default for Mcp {
	fn default() -> Self {
		Self {
			name: "project-information-manager".to_string(),
			transport: "stdio".to_string(),
			bind: "127.0.0.1:9091".to_string(),
			auth_token: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rag {
	pub enabled: bool,
	pub collection: String,
	pub qdrant_url: String,
	pub vector_dim: u32,
	pub embedding: Embedding,
}
impl Rag {
	/// Collection name scoped to the embedding provider and model, so switching models never
	/// mixes vector spaces.
	pub fn collection_name(&self) -> String {
		crate::normalize_collection_name(&format!(
			"{}-{}-{}",
			self.collection, self.embedding.provider, self.embedding.model
		))
	}
}
impl Default for Rag {
	fn default() -> Self {
		Self {
			enabled: true,
			collection: DEFAULT_COLLECTION.to_string(),
			qdrant_url: "http://127.0.0.1:6334".to_string(),
			vector_dim: 1_536,
			embedding: Embedding::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Embedding {
	/// `openai` or `ollama`.
	pub provider: String,
	pub api_base: Option<String>,
	pub path: Option<String>,
	pub api_key: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}
impl Embedding {
	pub fn api_base(&self) -> &str {
		match (self.api_base.as_deref(), self.provider.as_str()) {
			(Some(base), _) => base,
			(None, "ollama") => OLLAMA_API_BASE,
			(None, _) => OPENAI_API_BASE,
		}
	}

	pub fn path(&self) -> &str {
		match (self.path.as_deref(), self.provider.as_str()) {
			(Some(path), _) => path,
			(None, "ollama") => OLLAMA_PATH,
			(None, _) => OPENAI_PATH,
		}
	}
}
impl Default for Embedding {
	fn default() -> Self {
		Self {
			provider: "openai".to_string(),
			api_base: None,
			path: None,
			api_key: String::new(),
			model: "text-embedding-3-small".to_string(),
			dimensions: 1_536,
			timeout_ms: 30_000,
			default_headers: Map::new(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	/// Multiplier applied to the requested limit when querying the vector index.
	pub overfetch_factor: u32,
	pub index_timeout_ms: u64,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_limit: 10, overfetch_factor: 4, index_timeout_ms: 3_000 }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub priority_weights: PriorityWeights,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
	pub p0: f32,
	pub p1: f32,
	pub p2: f32,
	pub p3: f32,
}
impl PriorityWeights {
	/// Weights ordered from the highest tier to the lowest.
	pub fn as_array(&self) -> [f32; 4] {
		[self.p0, self.p1, self.p2, self.p3]
	}
}
impl Default for PriorityWeights {
	fn default() -> Self {
		Self { p0: 1.30, p1: 1.15, p2: 1.00, p3: 0.85 }
	}
}
