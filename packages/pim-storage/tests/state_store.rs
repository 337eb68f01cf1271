use time::{Duration, macros::datetime};

use pim_domain::{Priority, State, StateStatus, StateType};
use pim_storage::{Error, SqliteStateStore, StateListOptions, StateStore};

fn state(id: &str, project_id: &str, priority: Priority, minutes: i64) -> State {
	let ts = datetime!(2025-01-01 00:00 UTC) + Duration::minutes(minutes);

	State {
		id: id.to_string(),
		project_id: project_id.to_string(),
		state_type: StateType::Task,
		status: StateStatus::Open,
		priority,
		title: format!("Title of {id}"),
		description: "Details.".to_string(),
		resolution: String::new(),
		tags: vec!["backend".to_string(), "api".to_string()],
		references: vec!["STK-DESIGN-001".to_string()],
		created_at: ts,
		updated_at: ts,
		archived_at: None,
	}
}

async fn open_store(dir: &tempfile::TempDir) -> SqliteStateStore {
	SqliteStateStore::open(&dir.path().join("states.db"))
		.await
		.expect("Failed to open state store.")
}

#[tokio::test]
async fn create_get_and_update_round_trip() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let mut record = state("STA-TASK-001", "P1", Priority::P1, 0);

	store.create(&record).await.expect("Failed to create state.");

	let err = store.create(&record).await.expect_err("Duplicate create must fail.");

	assert!(matches!(err, Error::AlreadyExists(_)), "Unexpected error: {err:?}");
	assert_eq!(store.get("STA-TASK-001").await.expect("Failed to get state."), record);

	record.archive("Done.", datetime!(2025-02-01 00:00 UTC)).expect("Failed to archive.");

	store.update(&record).await.expect("Failed to update state.");

	let fetched = store.get("STA-TASK-001").await.expect("Failed to get state.");

	assert_eq!(fetched.status, StateStatus::Archived);
	assert_eq!(fetched.archived_at, Some(datetime!(2025-02-01 00:00 UTC)));
	assert_eq!(fetched.resolution, "Done.");
	assert_eq!(fetched.tags, vec!["backend".to_string(), "api".to_string()]);
}

#[tokio::test]
async fn archived_rows_reject_stale_writes() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let stale = state("STA-TASK-002", "P1", Priority::P1, 0);
	let mut archived = stale.clone();

	store.create(&stale).await.expect("Failed to create state.");
	archived.archive("Shipped.", datetime!(2025-02-01 00:00 UTC)).expect("Failed to archive.");
	store.update(&archived).await.expect("Failed to archive stored state.");

	let err = store.update(&stale).await.expect_err("Stale write must fail.");

	assert!(
		matches!(&err, Error::Archived(id) if id == "STA-TASK-002"),
		"Unexpected error: {err:?}"
	);

	let err = store.update(&archived).await.expect_err("Second archive must fail.");

	assert!(matches!(err, Error::Archived(_)), "Unexpected error: {err:?}");

	let fetched = store.get("STA-TASK-002").await.expect("Failed to get state.");

	assert_eq!(fetched, archived);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;

	assert!(store.get("STA-TASK-404").await.expect_err("get").is_not_found());
	assert!(
		store
			.update(&state("STA-TASK-404", "P1", Priority::P2, 0))
			.await
			.expect_err("update")
			.is_not_found()
	);
}

#[tokio::test]
async fn list_excludes_archived_unless_requested() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let mut archived = state("STA-TASK-003", "P1", Priority::P0, 30);

	archived.archive("Obsolete.", datetime!(2025-01-02 00:00 UTC)).expect("archive");

	for record in [
		state("STA-TASK-001", "P1", Priority::P2, 0),
		state("STA-TASK-002", "P1", Priority::P2, 20),
		archived,
		state("STA-TASK-004", "P2", Priority::P0, 0),
	] {
		store.create(&record).await.expect("Failed to create state.");
	}

	let ids = |states: Vec<State>| states.into_iter().map(|state| state.id).collect::<Vec<_>>();
	let active = store.list("P1", &StateListOptions::default()).await.expect("list");

	assert_eq!(ids(active), vec!["STA-TASK-002", "STA-TASK-001"]);

	let all = store
		.list("P1", &StateListOptions { include_archived: true, ..Default::default() })
		.await
		.expect("list");

	assert_eq!(ids(all), vec!["STA-TASK-003", "STA-TASK-002", "STA-TASK-001"]);

	let archived_only = store
		.list(
			"P1",
			&StateListOptions {
				status: Some(StateStatus::Archived),
				include_archived: true,
				..Default::default()
			},
		)
		.await
		.expect("list");

	assert_eq!(ids(archived_only), vec!["STA-TASK-003"]);

	let paged = store
		.list("", &StateListOptions { limit: Some(1), offset: 1, ..Default::default() })
		.await
		.expect("list");

	assert_eq!(ids(paged), vec!["STA-TASK-002"]);
}

#[tokio::test]
async fn database_runs_in_wal_mode() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
		.fetch_one(&store.pool)
		.await
		.expect("Failed to read journal mode.");

	assert_eq!(mode.to_lowercase(), "wal");
}
