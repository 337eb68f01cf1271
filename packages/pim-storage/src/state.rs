use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
	types::Json,
};
use time::{
	OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::FormatItem,
	macros::format_description,
};

use crate::{BoxFuture, Error, Result, StateListOptions, StateStore, schema};
use pim_domain::{Priority, State, StateStatus, StateType};

/// Fixed-width UTC timestamps keep lexical and chronological order identical.
const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
	format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z");

const SELECT_COLUMNS: &str = "\
SELECT
	id,
	project_id,
	type,
	status,
	priority,
	title,
	description,
	resolution,
	tags,
	ref_ids,
	created_at,
	updated_at,
	archived_at
FROM states";

#[derive(Debug, sqlx::FromRow)]
struct StateRow {
	id: String,
	project_id: String,
	#[sqlx(rename = "type")]
	state_type: String,
	status: String,
	priority: i64,
	title: String,
	description: String,
	resolution: String,
	tags: Json<Vec<String>>,
	ref_ids: Json<Vec<String>>,
	created_at: String,
	updated_at: String,
	archived_at: Option<String>,
}
impl TryFrom<StateRow> for State {
	type Error = Error;

	fn try_from(row: StateRow) -> Result<Self> {
		let corrupt = |field: &str| Error::Corrupt(format!("state {} has invalid {field}", row.id));
		let state_type = StateType::from_str(&row.state_type).map_err(|_| corrupt("type"))?;
		let status = StateStatus::from_str(&row.status).map_err(|_| corrupt("status"))?;
		let priority = Priority::from_rank(row.priority).ok_or_else(|| corrupt("priority"))?;
		let created_at = decode_timestamp(&row.created_at).ok_or_else(|| corrupt("created_at"))?;
		let updated_at = decode_timestamp(&row.updated_at).ok_or_else(|| corrupt("updated_at"))?;
		let archived_at = match row.archived_at.as_deref() {
			Some(raw) => Some(decode_timestamp(raw).ok_or_else(|| corrupt("archived_at"))?),
			None => None,
		};

		Ok(State {
			id: row.id,
			project_id: row.project_id,
			state_type,
			status,
			priority,
			title: row.title,
			description: row.description,
			resolution: row.resolution,
			tags: row.tags.0,
			references: row.ref_ids.0,
			created_at,
			updated_at,
			archived_at,
		})
	}
}

/// State records in a SQLite database running in WAL mode, so readers proceed alongside the
/// single writer.
#[derive(Clone, Debug)]
pub struct SqliteStateStore {
	pub pool: SqlitePool,
}
impl SqliteStateStore {
	pub async fn open(path: &Path) -> Result<Self> {
		let options = SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.busy_timeout(Duration::from_secs(5));
		let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
		let store = Self { pool };

		store.ensure_schema().await?;

		Ok(store)
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		for statement in schema::statements() {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	async fn insert(&self, state: &State) -> Result<()> {
		let result = sqlx::query(
			"\
INSERT INTO states (
	id,
	project_id,
	type,
	status,
	priority,
	title,
	description,
	resolution,
	tags,
	ref_ids,
	created_at,
	updated_at,
	archived_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
		)
		.bind(state.id.as_str())
		.bind(state.project_id.as_str())
		.bind(state.state_type.as_str())
		.bind(state.status.as_str())
		.bind(i64::from(state.priority.rank()))
		.bind(state.title.as_str())
		.bind(state.description.as_str())
		.bind(state.resolution.as_str())
		.bind(Json(&state.tags))
		.bind(Json(&state.references))
		.bind(encode_timestamp(state.created_at)?)
		.bind(encode_timestamp(state.updated_at)?)
		.bind(state.archived_at.map(encode_timestamp).transpose()?)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(err)) if err.is_unique_violation() =>
				Err(Error::AlreadyExists(format!("state {}", state.id))),
			Err(err) => Err(err.into()),
		}
	}

	async fn fetch(&self, id: &str) -> Result<State> {
		let sql = format!("{SELECT_COLUMNS}\nWHERE id = ?1");
		let row = sqlx::query_as::<_, StateRow>(&sql)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| Error::NotFound(format!("state {id}")))?;

		row.try_into()
	}

	/// Archived rows are frozen: the write only lands while the stored row is still active, so
	/// a concurrent archive can never be undone by a stale update.
	async fn replace(&self, state: &State) -> Result<()> {
		let result = sqlx::query(
			"\
UPDATE states
SET
	status = ?1,
	priority = ?2,
	title = ?3,
	description = ?4,
	resolution = ?5,
	tags = ?6,
	ref_ids = ?7,
	updated_at = ?8,
	archived_at = ?9
WHERE id = ?10 AND status != 'archived'",
		)
		.bind(state.status.as_str())
		.bind(i64::from(state.priority.rank()))
		.bind(state.title.as_str())
		.bind(state.description.as_str())
		.bind(state.resolution.as_str())
		.bind(Json(&state.tags))
		.bind(Json(&state.references))
		.bind(encode_timestamp(state.updated_at)?)
		.bind(state.archived_at.map(encode_timestamp).transpose()?)
		.bind(state.id.as_str())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM states WHERE id = ?1")
				.bind(state.id.as_str())
				.fetch_one(&self.pool)
				.await?;

			if exists > 0 {
				return Err(Error::Archived(state.id.clone()));
			}

			return Err(Error::NotFound(format!("state {}", state.id)));
		}

		Ok(())
	}

	async fn select(&self, project_id: &str, opts: &StateListOptions) -> Result<Vec<State>> {
		let sql = format!(
			"\
{SELECT_COLUMNS}
WHERE (?1 = '' OR project_id = ?1)
	AND (?2 IS NULL OR type = ?2)
	AND (?3 IS NULL OR status = ?3)
	AND (?4 IS NULL OR priority = ?4)
	AND (?5 OR status != 'archived')
ORDER BY priority ASC, updated_at DESC, id ASC
LIMIT ?6 OFFSET ?7"
		);
		// SQLite treats a negative LIMIT as unbounded.
		let limit = opts.limit.and_then(|limit| i64::try_from(limit).ok()).unwrap_or(-1);
		let offset = i64::try_from(opts.offset).unwrap_or(i64::MAX);
		let rows = sqlx::query_as::<_, StateRow>(&sql)
			.bind(project_id)
			.bind(opts.state_type.map(StateType::as_str))
			.bind(opts.status.map(StateStatus::as_str))
			.bind(opts.priority.map(|priority| i64::from(priority.rank())))
			.bind(opts.include_archived)
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;

		rows.into_iter().map(State::try_from).collect()
	}
}
impl StateStore for SqliteStateStore {
	fn create<'a>(&'a self, state: &'a State) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.insert(state))
	}

	fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<State>> {
		Box::pin(self.fetch(id))
	}

	fn update<'a>(&'a self, state: &'a State) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.replace(state))
	}

	fn list<'a>(
		&'a self,
		project_id: &'a str,
		opts: &'a StateListOptions,
	) -> BoxFuture<'a, Result<Vec<State>>> {
		Box::pin(self.select(project_id, opts))
	}
}

fn encode_timestamp(ts: OffsetDateTime) -> Result<String> {
	ts.to_offset(UtcOffset::UTC)
		.format(TIMESTAMP_FORMAT)
		.map_err(|err| Error::InvalidArgument(format!("unencodable timestamp: {err}")))
}

fn decode_timestamp(raw: &str) -> Option<OffsetDateTime> {
	PrimitiveDateTime::parse(raw, TIMESTAMP_FORMAT).ok().map(PrimitiveDateTime::assume_utc)
}
