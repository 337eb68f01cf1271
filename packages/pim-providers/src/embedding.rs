use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use pim_config::Embedding;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Wire {
	/// `POST {model, input, dimensions}` answered with `data[].embedding`.
	OpenAi,
	/// `POST {model, input}` answered with `embeddings[]`.
	Ollama,
}
impl Wire {
	fn for_provider(provider: &str) -> Result<Self> {
		match provider {
			"openai" => Ok(Self::OpenAi),
			"ollama" => Ok(Self::Ollama),
			other => Err(Error::InvalidConfig {
				message: format!("Unsupported embedding provider {other:?}."),
			}),
		}
	}
}

/// Checks the settings a provider needs before any request is made.
pub fn check(cfg: &Embedding) -> Result<()> {
	let wire = Wire::for_provider(&cfg.provider)?;

	if wire == Wire::OpenAi && cfg.api_key.trim().is_empty() {
		return Err(Error::InvalidConfig {
			message: "rag.embedding.api_key is required for the openai provider.".to_string(),
		});
	}
	if cfg.model.trim().is_empty() {
		return Err(Error::InvalidConfig {
			message: "rag.embedding.model is required.".to_string(),
		});
	}

	Ok(())
}

pub async fn embed(cfg: &Embedding, texts: &[String]) -> Result<Vec<Vec<f32>>> {
	check(cfg)?;

	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let wire = Wire::for_provider(&cfg.provider)?;
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base(), cfg.path());
	let body = match wire {
		Wire::OpenAi => serde_json::json!({
			"model": cfg.model,
			"input": texts,
			"dimensions": cfg.dimensions,
		}),
		Wire::Ollama => serde_json::json!({
			"model": cfg.model,
			"input": texts,
		}),
	};
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = match wire {
		Wire::OpenAi => parse_openai_response(json)?,
		Wire::Ollama => parse_ollama_response(json)?,
	};

	if vectors.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding provider returned {} vectors for {} inputs.",
				vectors.len(),
				texts.len()
			),
		});
	}
	if vectors.iter().any(|vec| vec.len() != cfg.dimensions as usize) {
		return Err(Error::InvalidResponse {
			message: "Embedding vector dimension mismatch.".to_string(),
		});
	}

	Ok(vectors)
}

fn parse_openai_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").ok_or_else(|| Error::InvalidResponse {
			message: "Embedding item missing embedding array.".to_string(),
		})?;

		indexed.push((index, parse_vector(embedding)?));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn parse_ollama_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let embeddings = json.get("embeddings").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse {
			message: "Embedding response is missing embeddings array.".to_string(),
		}
	})?;

	embeddings.iter().map(parse_vector).collect()
}

fn parse_vector(value: &Value) -> Result<Vec<f32>> {
	let items = value.as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Embedding must be an array.".to_string(),
	})?;

	items
		.iter()
		.map(|item| {
			item.as_f64().map(|number| number as f32).ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})
		})
		.collect()
}
