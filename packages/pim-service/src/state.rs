use time::OffsetDateTime;

use crate::{Error, PimService, Result, ScoredState};
use pim_domain::{EntityKind, Priority, State, StateStatus, StateSummary, StateType};
use pim_storage::StateListOptions;

#[derive(Clone, Debug)]
pub struct CreateStateInput {
	pub project_id: String,
	pub state_type: StateType,
	pub priority: Priority,
	pub title: String,
	pub description: String,
	pub tags: Vec<String>,
	pub references: Vec<String>,
}

/// Fields left as `None` keep their stored value. A status of `archived` archives the record.
#[derive(Clone, Debug, Default)]
pub struct UpdateStateInput {
	pub status: Option<StateStatus>,
	pub description: Option<String>,
	pub resolution: Option<String>,
	pub priority: Option<Priority>,
	pub tags: Option<Vec<String>>,
	pub references: Option<Vec<String>>,
}

impl PimService {
	pub async fn create_state(&self, input: CreateStateInput) -> Result<State> {
		crate::require("project_id", &input.project_id)?;
		crate::require("title", &input.title)?;

		let now = OffsetDateTime::now_utc();
		let state = State {
			id: self.ids.state_id(input.state_type),
			project_id: input.project_id,
			state_type: input.state_type,
			status: StateStatus::Open,
			priority: input.priority,
			title: input.title,
			description: input.description,
			resolution: String::new(),
			tags: input.tags,
			references: input.references,
			created_at: now,
			updated_at: now,
			archived_at: None,
		};

		self.states.create(&state).await?;
		self.index_state(&state).await;

		Ok(state)
	}

	pub async fn get_state(&self, id: &str) -> Result<State> {
		crate::require("id", id)?;

		Ok(self.states.get(id).await?)
	}

	/// Archived records are immutable and reject every update.
	pub async fn update_state(&self, id: &str, input: UpdateStateInput) -> Result<State> {
		let mut state = self.get_state(id).await?;

		if !state.is_active() {
			return Err(Error::Archived { id: state.id });
		}

		let now = OffsetDateTime::now_utc();

		if let Some(description) = input.description {
			state.description = description;
		}
		if let Some(priority) = input.priority {
			state.priority = priority;
		}
		if let Some(tags) = input.tags {
			state.tags = tags;
		}
		if let Some(references) = input.references {
			state.references = references;
		}

		match input.status {
			Some(StateStatus::Archived) => {
				let resolution = input.resolution.unwrap_or_else(|| state.resolution.clone());

				state.archive(resolution, now)?;
			},
			status => {
				if let Some(status) = status {
					state.status = status;
				}
				if let Some(resolution) = input.resolution {
					state.resolution = resolution;
				}

				state.updated_at = now;
			},
		}

		self.states.update(&state).await?;

		if state.is_active() {
			self.index_state(&state).await;
		} else {
			self.unindex(&state.id).await;
		}

		Ok(state)
	}

	/// Moves the record to `archived` and removes it from the index.
	pub async fn archive_state(&self, id: &str, resolution: &str) -> Result<State> {
		let mut state = self.get_state(id).await?;

		state.archive(resolution, OffsetDateTime::now_utc())?;

		self.states.update(&state).await?;
		self.unindex(&state.id).await;

		Ok(state)
	}

	pub async fn list_states(&self, project_id: &str, opts: &StateListOptions) -> Result<Vec<State>> {
		crate::require("project_id", project_id)?;

		Ok(self.states.list(project_id, opts).await?)
	}

	pub async fn list_state_summaries(
		&self,
		project_id: &str,
		opts: &StateListOptions,
	) -> Result<Vec<StateSummary>> {
		let states = self.list_states(project_id, opts).await?;

		Ok(states.iter().map(State::to_summary).collect())
	}

	/// Retrieval restricted to active States. A blank query ranks every active State.
	pub async fn search_states(
		&self,
		project_id: &str,
		query: &str,
		limit: Option<i64>,
	) -> Result<Vec<ScoredState>> {
		crate::require("project_id", project_id)?;

		let limit = self.settings.resolve_limit(limit);
		let response = self.retrieve(query, project_id, limit, Some(EntityKind::State)).await?;

		Ok(response.states)
	}
}
