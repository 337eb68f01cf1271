use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Priority, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
	Task,
	Issue,
	Incident,
	Change,
}
impl StateType {
	pub const ALL: [Self; 4] = [Self::Task, Self::Issue, Self::Incident, Self::Change];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Task => "task",
			Self::Issue => "issue",
			Self::Incident => "incident",
			Self::Change => "change",
		}
	}
}
impl fmt::Display for StateType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for StateType {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		let normalized = raw.trim().to_ascii_lowercase();

		Self::ALL
			.into_iter()
			.find(|state_type| state_type.as_str() == normalized)
			.ok_or_else(|| Error::InvalidStateType { value: raw.to_string() })
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
	#[default]
	Open,
	InProgress,
	Resolved,
	Archived,
}
impl StateStatus {
	pub const ALL: [Self; 4] = [Self::Open, Self::InProgress, Self::Resolved, Self::Archived];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Open => "open",
			Self::InProgress => "in_progress",
			Self::Resolved => "resolved",
			Self::Archived => "archived",
		}
	}
}
impl fmt::Display for StateStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for StateStatus {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		let normalized = raw.trim().to_ascii_lowercase();

		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == normalized)
			.ok_or_else(|| Error::InvalidStatus { value: raw.to_string() })
	}
}

/// Ticket-like record that ends its life archived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
	pub id: String,
	pub project_id: String,
	#[serde(rename = "type")]
	pub state_type: StateType,
	pub status: StateStatus,
	pub priority: Priority,
	pub title: String,
	pub description: String,
	#[serde(default)]
	pub resolution: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub references: Vec<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "time::serde::rfc3339::option"
	)]
	pub archived_at: Option<OffsetDateTime>,
}
impl State {
	pub fn is_active(&self) -> bool {
		self.status != StateStatus::Archived
	}

	/// Moves the record to its terminal status. The archive timestamp is written exactly once.
	pub fn archive(&mut self, resolution: impl Into<String>, now: OffsetDateTime) -> Result<()> {
		if !self.is_active() {
			return Err(Error::AlreadyArchived { id: self.id.clone() });
		}

		self.status = StateStatus::Archived;
		self.resolution = resolution.into();
		self.archived_at = Some(now);
		self.updated_at = now;

		Ok(())
	}

	pub fn to_summary(&self) -> StateSummary {
		StateSummary {
			id: self.id.clone(),
			project_id: self.project_id.clone(),
			state_type: self.state_type,
			status: self.status,
			priority: self.priority,
			title: self.title.clone(),
			tags: self.tags.clone(),
			updated_at: self.updated_at,
		}
	}

	pub fn index_text(&self) -> String {
		format!("{}\n{}", self.title, self.description)
	}
}

/// State without description or resolution text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
	pub id: String,
	pub project_id: String,
	#[serde(rename = "type")]
	pub state_type: StateType,
	pub status: StateStatus,
	pub priority: Priority,
	pub title: String,
	pub tags: Vec<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
