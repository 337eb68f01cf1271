use std::{collections::HashMap, fs, path::PathBuf};

use pim_config::{Config, Error};

const EXAMPLE_TOML: &str = include_str!("../../../pim.example.toml");

fn example_config() -> Config {
	toml::from_str(EXAMPLE_TOML).expect("Failed to parse example config.")
}

fn assert_validation_error(cfg: &Config, needle: &str) {
	let err = pim_config::validate(cfg).expect_err("Expected validation error.");

	match err {
		Error::Validation { message } => {
			assert!(message.contains(needle), "Unexpected validation message: {message}");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[test]
fn pim_example_toml_is_valid() {
	pim_config::validate(&example_config()).expect("Example config must be valid.");
}

#[test]
fn defaults_are_valid() {
	let cfg = Config::default();

	pim_config::validate(&cfg).expect("Default config must be valid.");

	assert_eq!(cfg.search.default_limit, 10);
	assert_eq!(cfg.search.overfetch_factor, 4);
	assert_eq!(cfg.storage.stocks_dir(), PathBuf::from("data").join("stocks"));
	assert_eq!(cfg.storage.states_db_path(), PathBuf::from("data").join("states.db"));
}

#[test]
fn partial_files_fall_back_to_defaults() {
	let cfg: Config = toml::from_str("[search]\ndefault_limit = 5\n").expect("Failed to parse.");

	assert_eq!(cfg.search.default_limit, 5);
	assert_eq!(cfg.search.overfetch_factor, 4);
	assert_eq!(cfg.mcp.transport, "stdio");
	assert!((cfg.ranking.priority_weights.p0 - 1.30).abs() < f32::EPSILON);
}

#[test]
fn priority_weights_must_be_strictly_decreasing() {
	let mut cfg = example_config();

	cfg.ranking.priority_weights.p2 = cfg.ranking.priority_weights.p1;

	assert_validation_error(&cfg, "strictly decreasing");

	cfg.ranking.priority_weights.p2 = 1.20;

	assert_validation_error(&cfg, "strictly decreasing");
}

#[test]
fn priority_weights_must_be_positive_and_finite() {
	let mut cfg = example_config();

	cfg.ranking.priority_weights.p3 = 0.0;

	assert_validation_error(&cfg, "greater than zero");

	cfg.ranking.priority_weights.p3 = 0.85;
	cfg.ranking.priority_weights.p0 = f32::INFINITY;

	assert_validation_error(&cfg, "finite");
}

#[test]
fn search_limits_must_be_positive() {
	let mut cfg = example_config();

	cfg.search.overfetch_factor = 0;

	assert_validation_error(&cfg, "search.overfetch_factor");

	let mut cfg = example_config();

	cfg.search.index_timeout_ms = 0;

	assert_validation_error(&cfg, "search.index_timeout_ms");
}

#[test]
fn http_transport_requires_loopback_without_token() {
	let mut cfg = example_config();

	cfg.mcp.transport = "http".to_string();
	cfg.mcp.bind = "0.0.0.0:9091".to_string();

	assert_validation_error(&cfg, "loopback");

	cfg.mcp.auth_token = Some("secret".to_string());

	pim_config::validate(&cfg).expect("Token-protected wildcard bind must be valid.");
}

#[test]
fn unknown_transport_is_rejected() {
	let mut cfg = example_config();

	cfg.mcp.transport = "grpc".to_string();

	assert_validation_error(&cfg, "mcp.transport");
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let mut cfg = example_config();

	cfg.rag.embedding.dimensions = 768;

	assert_validation_error(&cfg, "rag.vector_dim");

	cfg.rag.enabled = false;

	pim_config::validate(&cfg).expect("Disabled RAG skips embedding checks.");
}

#[test]
fn env_overrides_replace_file_values() {
	let mut cfg = example_config();
	let env = HashMap::from([
		("PIM_DATA_DIR", "/var/lib/pim"),
		("PIM_RAG_ENABLED", "false"),
		("PIM_RAG_EMBEDDING_PROVIDER", "ollama"),
		("PIM_RAG_EMBEDDING_MODEL", "nomic-embed-text"),
		("PIM_RAG_COLLECTION", ""),
	]);

	pim_config::apply_overrides(&mut cfg, |key| env.get(key).map(|value| value.to_string()));

	assert_eq!(cfg.storage.data_dir, PathBuf::from("/var/lib/pim"));
	assert!(!cfg.rag.enabled);
	assert_eq!(cfg.rag.embedding.provider, "ollama");
	assert_eq!(cfg.rag.embedding.model, "nomic-embed-text");
	assert_eq!(cfg.rag.collection, "pim-context");
	assert_eq!(cfg.rag.embedding.api_base(), pim_config::OLLAMA_API_BASE);
}

#[test]
fn collection_name_includes_provider_and_model() {
	let cfg = example_config();

	assert_eq!(cfg.rag.collection_name(), "pim-context-openai-text-embedding-3-small");
}

#[test]
fn load_reports_parse_errors_with_path() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let path = dir.path().join("broken.toml");

	fs::write(&path, "[search\n").expect("Failed to write test config.");

	let err = pim_config::load(Some(&path)).expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error: {err:?}");
}

#[test]
fn unvalidated_load_defers_validation_to_the_caller() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let path = dir.path().join("pim.toml");

	fs::write(&path, "[search]\ndefault_limit = 0\n").expect("Failed to write test config.");

	let mut cfg = pim_config::load_unvalidated(Some(&path)).expect("Load must not validate.");

	assert_eq!(cfg.search.default_limit, 0);
	assert!(pim_config::load(Some(&path)).is_err());

	cfg.search.default_limit = 5;

	pim_config::validate(&cfg).expect("Repaired config must be valid.");
}
