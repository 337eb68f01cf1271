use std::{sync::Arc, time::Duration};

use pim_domain::{Priority, StateStatus};
use pim_service::{ContextSearchRequest, ContextSearchResponse, Error, PimService, SearchSettings};
use pim_storage::{VectorIndex, vector};
use pim_testkit::{BrokenStores, FailingIndex, MemoryIndex, SlowIndex, TestStores};

const PROJECT: &str = "alpha";

fn service(stores: &TestStores, index: Option<Arc<dyn VectorIndex>>) -> PimService {
	PimService::new(stores.stocks.clone(), stores.states.clone(), index)
}

fn request(query: &str, limit: Option<i64>) -> ContextSearchRequest {
	ContextSearchRequest { query: query.to_string(), project_id: PROJECT.to_string(), limit }
}

fn ids(response: &ContextSearchResponse) -> (Vec<String>, Vec<String>) {
	(
		response.stocks.iter().map(|item| item.summary.id.clone()).collect(),
		response.states.iter().map(|item| item.summary.id.clone()).collect(),
	)
}

async fn seed_api_records(stores: &TestStores) {
	stores
		.put_stock(&pim_testkit::stock("STK-DESIGN-001", PROJECT, Priority::P0, "API design guide"))
		.await
		.expect("Failed to seed stock.");
	stores
		.put_state(&pim_testkit::state("STA-TASK-001", PROJECT, Priority::P3, "API design task"))
		.await
		.expect("Failed to seed state.");
}

#[tokio::test]
async fn keyword_search_ranks_by_priority_across_kinds() {
	let stores = TestStores::new().await.expect("Failed to create stores.");

	seed_api_records(&stores).await;

	let response = service(&stores, None)
		.context_search(request("api design", Some(1)))
		.await
		.expect("Search failed.");

	assert_eq!(response.total, 1);
	assert_eq!(ids(&response), (vec!["STK-DESIGN-001".to_string()], Vec::new()));
	assert!((response.stocks[0].score - 1.30).abs() < 1e-6);
}

#[tokio::test]
async fn semantic_search_weights_similarity_by_priority() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let index = Arc::new(MemoryIndex::new());
	let stock = pim_testkit::stock("STK-DESIGN-001", PROJECT, Priority::P1, "Auth flow");
	let state = pim_testkit::state("STA-ISSUE-001", PROJECT, Priority::P2, "Token expiry bug");

	stores.put_stock(&stock).await.expect("Failed to seed stock.");
	stores.put_state(&state).await.expect("Failed to seed state.");
	index.insert(&stock.id, &stock.index_text(), vector::stock_metadata(&stock));
	index.insert(&state.id, &state.index_text(), vector::state_metadata(&state));
	index.set_similarity(&stock.id, 0.8);
	index.set_similarity(&state.id, 0.8);

	let response = service(&stores, Some(index.clone()))
		.context_search(request("login", None))
		.await
		.expect("Search failed.");

	assert_eq!(response.total, 2);
	assert!((response.stocks[0].score - 0.92).abs() < 1e-6);
	assert!((response.states[0].score - 0.80).abs() < 1e-6);

	let top = service(&stores, Some(index))
		.context_search(request("login", Some(1)))
		.await
		.expect("Search failed.");

	assert_eq!(top.total, 1);
	assert_eq!(ids(&top), (vec![stock.id.clone()], Vec::new()));
}

#[tokio::test]
async fn index_is_queried_with_overfetch_and_project_filter() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let index = Arc::new(MemoryIndex::new());

	service(&stores, Some(index.clone()))
		.context_search(request("anything", Some(5)))
		.await
		.expect("Search failed.");

	let calls = index.search_calls();

	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].limit, 20);
	assert_eq!(calls[0].filters, vector::project_filter(PROJECT, None));
}

#[tokio::test]
async fn failing_index_matches_keyword_results() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let failing = Arc::new(FailingIndex::new());

	seed_api_records(&stores).await;

	let keyword = service(&stores, None)
		.context_search(request("api", None))
		.await
		.expect("Keyword search failed.");
	let degraded = service(&stores, Some(failing.clone()))
		.context_search(request("api", None))
		.await
		.expect("Fallback search failed.");

	assert_eq!(failing.calls(), 1);
	assert_eq!(ids(&degraded), ids(&keyword));
	assert_eq!(degraded.total, 2);
}

#[tokio::test]
async fn slow_index_times_out_into_keyword_search() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let index = Arc::new(SlowIndex::new(Duration::from_secs(5)));
	let settings =
		SearchSettings { index_timeout: Duration::from_millis(20), ..SearchSettings::default() };

	seed_api_records(&stores).await;

	let response = service(&stores, Some(index))
		.with_settings(settings)
		.context_search(request("api design", None))
		.await
		.expect("Search failed.");

	assert_eq!(response.total, 2);
}

#[tokio::test]
async fn zero_index_hits_do_not_fall_back() {
	let stores = TestStores::new().await.expect("Failed to create stores.");

	seed_api_records(&stores).await;

	let response = service(&stores, Some(Arc::new(MemoryIndex::new())))
		.context_search(request("api design", None))
		.await
		.expect("Search failed.");

	assert_eq!(response.total, 0);
	assert!(response.stocks.is_empty() && response.states.is_empty());
}

#[tokio::test]
async fn stale_and_foreign_hits_are_dropped() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let index = Arc::new(MemoryIndex::new());
	let live = pim_testkit::stock("STK-DESIGN-001", PROJECT, Priority::P2, "Live");
	let deleted = pim_testkit::stock("STK-DESIGN-002", PROJECT, Priority::P0, "Deleted");
	let moved = pim_testkit::stock("STK-DESIGN-003", "beta", Priority::P0, "Moved");

	stores.put_stock(&live).await.expect("Failed to seed stock.");
	stores.put_stock(&moved).await.expect("Failed to seed stock.");
	index.insert(&live.id, &live.index_text(), vector::stock_metadata(&live));
	index.insert(&deleted.id, &deleted.index_text(), vector::stock_metadata(&deleted));
	// Indexed while it still belonged to the searched project.
	index.insert(
		&moved.id,
		&moved.index_text(),
		vector::stock_metadata(&pim_testkit::stock(&moved.id, PROJECT, Priority::P0, "Moved")),
	);

	let response = service(&stores, Some(index))
		.context_search(request("anything", None))
		.await
		.expect("Search failed.");

	assert_eq!(ids(&response), (vec![live.id.clone()], Vec::new()));
}

#[tokio::test]
async fn archived_states_never_appear() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let index = Arc::new(MemoryIndex::new());
	let active = pim_testkit::state("STA-TASK-001", PROJECT, Priority::P2, "Deploy pipeline");
	let mut archived = pim_testkit::state("STA-TASK-002", PROJECT, Priority::P0, "Deploy hotfix");

	archived
		.archive("done", pim_testkit::ts(60))
		.expect("Failed to archive fixture.");
	stores.put_state(&active).await.expect("Failed to seed state.");
	stores.put_state(&archived).await.expect("Failed to seed state.");
	// Left behind by an index write that failed during archive.
	index.insert(&archived.id, &archived.index_text(), vector::state_metadata(&active));
	index.insert(&active.id, &active.index_text(), vector::state_metadata(&active));
	index.set_similarity(&archived.id, 1.0);

	let semantic = service(&stores, Some(index))
		.context_search(request("deploy", None))
		.await
		.expect("Semantic search failed.");
	let keyword = service(&stores, None)
		.context_search(request("deploy", None))
		.await
		.expect("Keyword search failed.");

	for response in [semantic, keyword] {
		assert_eq!(ids(&response), (Vec::new(), vec![active.id.clone()]));
		assert!(response.states.iter().all(|item| item.summary.status != StateStatus::Archived));
	}
}

#[tokio::test]
async fn limit_caps_the_combined_result() {
	let stores = TestStores::new().await.expect("Failed to create stores.");

	for n in 0..5 {
		let stock = pim_testkit::stock(&format!("STK-TEST-{n:03}"), PROJECT, Priority::P2, "Note");
		let state = pim_testkit::state(&format!("STA-TASK-{n:03}"), PROJECT, Priority::P1, "Note");

		stores.put_stock(&stock).await.expect("Failed to seed stock.");
		stores.put_state(&state).await.expect("Failed to seed state.");
	}

	let response = service(&stores, None)
		.context_search(request("note", Some(3)))
		.await
		.expect("Search failed.");

	assert_eq!(response.total, 3);
	assert_eq!(response.stocks.len() + response.states.len(), 3);
	// P1 States outrank P2 Stocks, so the cut keeps only States.
	assert_eq!(response.states.len(), 3);
}

#[tokio::test]
async fn non_positive_limit_means_ten() {
	let stores = TestStores::new().await.expect("Failed to create stores.");

	for n in 0..12 {
		let stock = pim_testkit::stock(&format!("STK-TEST-{n:03}"), PROJECT, Priority::P2, "Note");

		stores.put_stock(&stock).await.expect("Failed to seed stock.");
	}

	let service = service(&stores, None);

	for limit in [Some(0), Some(-5), None] {
		let response =
			service.context_search(request("note", limit)).await.expect("Search failed.");

		assert_eq!(response.total, 10);
	}
}

#[tokio::test]
async fn equal_scores_prefer_recent_then_id() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let mut newer = pim_testkit::stock("STK-DESIGN-009", PROJECT, Priority::P2, "Cache notes");
	let older_a = pim_testkit::stock("STK-DESIGN-002", PROJECT, Priority::P2, "Cache notes");
	let older_b = pim_testkit::stock("STK-DESIGN-001", PROJECT, Priority::P2, "Cache notes");

	newer.updated_at = pim_testkit::ts(120);

	for stock in [&newer, &older_a, &older_b] {
		stores.put_stock(stock).await.expect("Failed to seed stock.");
	}

	let response = service(&stores, None)
		.context_search(request("cache", None))
		.await
		.expect("Search failed.");

	assert_eq!(
		ids(&response).0,
		["STK-DESIGN-009", "STK-DESIGN-001", "STK-DESIGN-002"].map(String::from).to_vec()
	);
}

#[tokio::test]
async fn validation_runs_before_any_access() {
	let broken = Arc::new(BrokenStores::new());
	let index = Arc::new(FailingIndex::new());
	let service = PimService::new(broken.clone(), broken.clone(), Some(index.clone()));
	let missing_query = service
		.context_search(ContextSearchRequest {
			query: String::new(),
			project_id: PROJECT.to_string(),
			limit: None,
		})
		.await;
	let missing_project = service
		.context_search(ContextSearchRequest {
			query: "api".to_string(),
			project_id: String::new(),
			limit: None,
		})
		.await;

	assert!(matches!(missing_query, Err(Error::MissingField { field: "query" })));
	assert!(matches!(missing_project, Err(Error::MissingField { field: "project_id" })));
	assert_eq!(broken.calls(), 0);
	assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn store_listing_failures_are_surfaced() {
	let broken = Arc::new(BrokenStores::new());
	let index = Arc::new(FailingIndex::new());
	let service = PimService::new(broken.clone(), broken.clone(), Some(index));
	let result = service.context_search(request("api", None)).await;

	assert!(matches!(result, Err(Error::Storage { .. })));
}

#[tokio::test]
async fn results_are_summaries_with_scores() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let mut stock = pim_testkit::stock("STK-DESIGN-001", PROJECT, Priority::P0, "API design");

	stock.content = "Long body text.".to_string();
	stores.put_stock(&stock).await.expect("Failed to seed stock.");

	let response = service(&stores, None)
		.context_search(request("api", None))
		.await
		.expect("Search failed.");
	let json = serde_json::to_value(&response).expect("Failed to serialize response.");
	let item = &json["stocks"][0];

	assert_eq!(item["id"], "STK-DESIGN-001");
	assert_eq!(item["priority"], "P0");
	assert!(item.get("score").is_some());
	assert!(item.get("content").is_none());
	assert_eq!(json["total"], 1);
}

#[tokio::test]
async fn per_kind_search_restricts_the_index_filter() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let index = Arc::new(MemoryIndex::new());
	let stock = pim_testkit::stock("STK-DESIGN-001", PROJECT, Priority::P0, "Release plan");
	let state = pim_testkit::state("STA-TASK-001", PROJECT, Priority::P0, "Release checklist");

	stores.put_stock(&stock).await.expect("Failed to seed stock.");
	stores.put_state(&state).await.expect("Failed to seed state.");
	index.insert(&stock.id, &stock.index_text(), vector::stock_metadata(&stock));
	index.insert(&state.id, &state.index_text(), vector::state_metadata(&state));

	let service = service(&stores, Some(index.clone()));
	let states = service.search_states(PROJECT, "release", None).await.expect("Search failed.");

	assert_eq!(states.len(), 1);
	assert_eq!(states[0].summary.id, state.id);
	assert_eq!(
		index.search_calls()[0].filters,
		vector::project_filter(PROJECT, Some(pim_domain::EntityKind::State))
	);

	let stocks = service.search_stocks(PROJECT, "", None).await.expect("Search failed.");

	assert_eq!(stocks.len(), 1);
	// A blank query never reaches the index.
	assert_eq!(index.search_calls().len(), 1);
}

#[tokio::test]
async fn blank_query_orders_by_priority_then_recency() {
	let stores = TestStores::new().await.expect("Failed to create stores.");
	let index = Arc::new(MemoryIndex::new());
	let mut stocks = [
		pim_testkit::stock("STK-DESIGN-001", PROJECT, Priority::P2, "Old medium"),
		pim_testkit::stock("STK-DESIGN-002", PROJECT, Priority::P0, "Old highest"),
		pim_testkit::stock("STK-DESIGN-003", PROJECT, Priority::P2, "Fresh medium"),
		pim_testkit::stock("STK-DESIGN-004", PROJECT, Priority::P2, "Fresh medium twin"),
		pim_testkit::stock("STK-DESIGN-005", PROJECT, Priority::P3, "Newest lowest"),
	];

	stocks[2].updated_at = pim_testkit::ts(60);
	stocks[3].updated_at = pim_testkit::ts(60);
	stocks[4].updated_at = pim_testkit::ts(300);

	for stock in &stocks {
		stores.put_stock(stock).await.expect("Failed to seed stock.");
	}

	let mut states = [
		pim_testkit::state("STA-TASK-001", PROJECT, Priority::P1, "Older high"),
		pim_testkit::state("STA-TASK-002", PROJECT, Priority::P1, "Newer high"),
		pim_testkit::state("STA-TASK-003", PROJECT, Priority::P3, "Newest lowest"),
		pim_testkit::state("STA-TASK-004", PROJECT, Priority::P0, "Archived highest"),
	];

	states[1].updated_at = pim_testkit::ts(30);
	states[2].updated_at = pim_testkit::ts(90);
	states[3].archive("done", pim_testkit::ts(100)).expect("Failed to archive fixture.");

	for state in &states {
		stores.put_state(state).await.expect("Failed to seed state.");
	}

	let service = service(&stores, Some(index.clone()));
	let found_stocks = service.search_stocks(PROJECT, "", Some(4)).await.expect("Search failed.");
	let found_states =
		service.search_states(PROJECT, "  ", Some(2)).await.expect("Search failed.");

	assert_eq!(
		found_stocks.iter().map(|item| item.summary.id.as_str()).collect::<Vec<_>>(),
		["STK-DESIGN-002", "STK-DESIGN-003", "STK-DESIGN-004", "STK-DESIGN-001"]
	);
	assert_eq!(
		found_states.iter().map(|item| item.summary.id.as_str()).collect::<Vec<_>>(),
		["STA-TASK-002", "STA-TASK-001"]
	);
	assert!(index.search_calls().is_empty());
}
