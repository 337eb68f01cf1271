use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Priority};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockCategory {
	Design,
	Rules,
	Management,
	Architecture,
	Requirement,
	Test,
}
impl StockCategory {
	pub const ALL: [Self; 6] = [
		Self::Design,
		Self::Rules,
		Self::Management,
		Self::Architecture,
		Self::Requirement,
		Self::Test,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Design => "design",
			Self::Rules => "rules",
			Self::Management => "management",
			Self::Architecture => "architecture",
			Self::Requirement => "requirement",
			Self::Test => "test",
		}
	}
}
impl fmt::Display for StockCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for StockCategory {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let normalized = raw.trim().to_ascii_lowercase();

		Self::ALL
			.into_iter()
			.find(|category| category.as_str() == normalized)
			.ok_or_else(|| Error::InvalidCategory { value: raw.to_string() })
	}
}

/// Static reference knowledge: design notes, rules, policies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stock {
	pub id: String,
	pub project_id: String,
	pub category: StockCategory,
	pub priority: Priority,
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub references: Vec<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl Stock {
	pub fn to_summary(&self) -> StockSummary {
		StockSummary {
			id: self.id.clone(),
			project_id: self.project_id.clone(),
			category: self.category,
			priority: self.priority,
			title: self.title.clone(),
			tags: self.tags.clone(),
			updated_at: self.updated_at,
		}
	}

	/// Text handed to the vector index.
	pub fn index_text(&self) -> String {
		format!("{}\n{}", self.title, self.content)
	}
}

/// Stock without its content body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockSummary {
	pub id: String,
	pub project_id: String,
	pub category: StockCategory,
	pub priority: Priority,
	pub title: String,
	pub tags: Vec<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
