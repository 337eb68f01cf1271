use std::{fmt::Display, net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
	Router,
	body::Body,
	extract::State,
	http::{HeaderMap, Request, StatusCode},
	middleware::{self, Next},
	response::IntoResponse,
};
use color_eyre::Result;
use rmcp::{
	ErrorData, ServerHandler, ServiceExt,
	handler::server::router::tool::ToolRouter,
	model::{CallToolResult, JsonObject, ServerCapabilities, ServerInfo},
	transport::{
		stdio,
		streamable_http_server::{
			StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
		},
	},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::McpAuthState;
use pim_domain::{Priority, State as PimState};
use pim_service::{
	ContextSearchRequest, CreateStateInput, CreateStockInput, PimService, UpdateStateInput,
	UpdateStockInput,
};
use pim_storage::{StateListOptions, StockListOptions};

const HEADER_AUTHORIZATION: &str = "Authorization";
const STOCK_ACTIONS: &str = "create, read, update, delete, list, search";
const STATE_ACTIONS: &str = "create, read, update, archive, list, search";

#[derive(Clone)]
struct PimMcp {
	service: Arc<PimService>,
	tool_router: ToolRouter<Self>,
}
impl PimMcp {
	fn new(service: Arc<PimService>) -> Self {
		Self { service, tool_router: Self::tool_router() }
	}

	async fn stock_create(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let input = CreateStockInput {
			project_id: take_required_string(&mut params, "project_id")?,
			category: take_required_parsed(&mut params, "category")?,
			priority: take_optional_parsed(&mut params, "priority")?.unwrap_or(Priority::P3),
			title: take_required_string(&mut params, "title")?,
			content: take_optional_text(&mut params, "content")?.unwrap_or_default(),
			tags: take_string_list(&mut params, "tags")?.unwrap_or_default(),
			references: take_string_list(&mut params, "references")?.unwrap_or_default(),
		};

		match self.service.create_stock(input).await {
			Ok(stock) => Ok(CallToolResult::structured(json!({ "stock": stock.to_summary() }))),
			Err(err) => service_error(err),
		}
	}

	async fn stock_read(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let id = take_required_string(&mut params, "stock_id")?;

		match self.service.get_stock(&id).await {
			Ok(stock) => Ok(CallToolResult::structured(json!({ "stock": stock }))),
			Err(err) => service_error(err),
		}
	}

	async fn stock_update(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let id = take_required_string(&mut params, "stock_id")?;
		let input = UpdateStockInput {
			title: take_optional_string(&mut params, "title")?,
			content: take_optional_text(&mut params, "content")?,
			priority: take_optional_parsed(&mut params, "priority")?,
			tags: take_string_list(&mut params, "tags")?,
			references: take_string_list(&mut params, "references")?,
		};

		match self.service.update_stock(&id, input).await {
			Ok(stock) => Ok(CallToolResult::structured(json!({ "stock": stock.to_summary() }))),
			Err(err) => service_error(err),
		}
	}

	async fn stock_delete(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let id = take_required_string(&mut params, "stock_id")?;

		match self.service.delete_stock(&id).await {
			Ok(()) => Ok(CallToolResult::structured(json!({ "deleted": id }))),
			Err(err) => service_error(err),
		}
	}

	async fn stock_list(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let project_id = take_required_string(&mut params, "project_id")?;
		let opts = StockListOptions {
			category: take_optional_parsed(&mut params, "category")?,
			priority: take_optional_parsed(&mut params, "priority")?,
			tag: take_optional_string(&mut params, "tag")?,
			limit: take_optional_count(&mut params, "limit")?,
			offset: take_optional_count(&mut params, "offset")?.unwrap_or_default(),
		};

		match self.service.list_stock_summaries(&project_id, &opts).await {
			Ok(stocks) => Ok(CallToolResult::structured(
				json!({ "total": stocks.len(), "stocks": stocks }),
			)),
			Err(err) => service_error(err),
		}
	}

	async fn stock_search(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let project_id = take_required_string(&mut params, "project_id")?;
		let query = take_optional_text(&mut params, "query")?.unwrap_or_default();
		let limit = take_optional_i64(&mut params, "limit")?;

		match self.service.search_stocks(&project_id, &query, limit).await {
			Ok(stocks) => Ok(CallToolResult::structured(
				json!({ "total": stocks.len(), "stocks": stocks }),
			)),
			Err(err) => service_error(err),
		}
	}

	async fn state_create(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let input = CreateStateInput {
			project_id: take_required_string(&mut params, "project_id")?,
			state_type: take_required_parsed(&mut params, "type")?,
			priority: take_optional_parsed(&mut params, "priority")?.unwrap_or(Priority::P3),
			title: take_required_string(&mut params, "title")?,
			description: take_optional_text(&mut params, "description")?.unwrap_or_default(),
			tags: take_string_list(&mut params, "tags")?.unwrap_or_default(),
			references: take_string_list(&mut params, "references")?.unwrap_or_default(),
		};

		match self.service.create_state(input).await {
			Ok(state) => Ok(state_summary(&state)),
			Err(err) => service_error(err),
		}
	}

	async fn state_read(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let id = take_required_string(&mut params, "state_id")?;

		match self.service.get_state(&id).await {
			Ok(state) => Ok(CallToolResult::structured(json!({ "state": state }))),
			Err(err) => service_error(err),
		}
	}

	async fn state_update(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let id = take_required_string(&mut params, "state_id")?;
		let input = UpdateStateInput {
			status: take_optional_parsed(&mut params, "status")?,
			description: take_optional_text(&mut params, "description")?,
			resolution: take_optional_text(&mut params, "resolution")?,
			priority: take_optional_parsed(&mut params, "priority")?,
			tags: take_string_list(&mut params, "tags")?,
			references: take_string_list(&mut params, "references")?,
		};

		match self.service.update_state(&id, input).await {
			Ok(state) => Ok(state_summary(&state)),
			Err(err) => service_error(err),
		}
	}

	async fn state_archive(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let id = take_required_string(&mut params, "state_id")?;
		let resolution = take_optional_text(&mut params, "resolution")?.unwrap_or_default();

		match self.service.archive_state(&id, &resolution).await {
			Ok(state) => Ok(state_summary(&state)),
			Err(err) => service_error(err),
		}
	}

	async fn state_list(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let project_id = take_required_string(&mut params, "project_id")?;
		let opts = StateListOptions {
			state_type: take_optional_parsed(&mut params, "type")?,
			status: take_optional_parsed(&mut params, "status")?,
			priority: take_optional_parsed(&mut params, "priority")?,
			include_archived: take_optional_bool(&mut params, "include_archived")?
				.unwrap_or_default(),
			limit: take_optional_count(&mut params, "limit")?,
			offset: take_optional_count(&mut params, "offset")?.unwrap_or_default(),
		};

		match self.service.list_state_summaries(&project_id, &opts).await {
			Ok(states) => Ok(CallToolResult::structured(
				json!({ "total": states.len(), "states": states }),
			)),
			Err(err) => service_error(err),
		}
	}

	async fn state_search(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let project_id = take_required_string(&mut params, "project_id")?;
		let query = take_optional_text(&mut params, "query")?.unwrap_or_default();
		let limit = take_optional_i64(&mut params, "limit")?;

		match self.service.search_states(&project_id, &query, limit).await {
			Ok(states) => Ok(CallToolResult::structured(
				json!({ "total": states.len(), "states": states }),
			)),
			Err(err) => service_error(err),
		}
	}
}

#[rmcp::tool_router]
impl PimMcp {
	#[rmcp::tool(
		name = "context_search",
		description = "Search a project's Stocks and active States together. Results are ranked by relevance weighted by priority and returned as summaries; use stock_manage or state_manage with action=read for full text.",
		input_schema = context_search_schema()
	)]
	async fn context_search(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let query = take_required_string(&mut params, "query")?;
		let project_id = take_required_string(&mut params, "project_id")?;
		let limit = take_optional_i64(&mut params, "limit")?;
		let request = ContextSearchRequest { query, project_id, limit };

		match self.service.context_search(request).await {
			Ok(response) => Ok(CallToolResult::structured(json!(response))),
			Err(err) => service_error(err),
		}
	}

	#[rmcp::tool(
		name = "stock_manage",
		description = "Manage Stocks, the durable knowledge of a project (design, rules, architecture). Actions: create, read, update, delete, list, search. list and search return summaries; read returns the full record.",
		input_schema = stock_manage_schema()
	)]
	async fn stock_manage(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let action = take_required_string(&mut params, "action")?;

		match action.as_str() {
			"create" => self.stock_create(params).await,
			"read" => self.stock_read(params).await,
			"update" => self.stock_update(params).await,
			"delete" => self.stock_delete(params).await,
			"list" => self.stock_list(params).await,
			"search" => self.stock_search(params).await,
			other => Err(ErrorData::invalid_params(
				format!("Unknown action {other}. Expected one of {STOCK_ACTIONS}."),
				None,
			)),
		}
	}

	#[rmcp::tool(
		name = "state_manage",
		description = "Manage States, the moving parts of a project (tasks, issues, incidents, changes). Actions: create, read, update, archive, list, search. Archived States are frozen and excluded from list and search unless include_archived is set on list.",
		input_schema = state_manage_schema()
	)]
	async fn state_manage(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let action = take_required_string(&mut params, "action")?;

		match action.as_str() {
			"create" => self.state_create(params).await,
			"read" => self.state_read(params).await,
			"update" => self.state_update(params).await,
			"archive" => self.state_archive(params).await,
			"list" => self.state_list(params).await,
			"search" => self.state_search(params).await,
			other => Err(ErrorData::invalid_params(
				format!("Unknown action {other}. Expected one of {STATE_ACTIONS}."),
				None,
			)),
		}
	}
}

#[rmcp::tool_handler]
impl ServerHandler for PimMcp {
	fn get_info(&self) -> ServerInfo {
		ServerInfo {
			instructions: Some(
				"Project knowledge manager. Stocks hold durable project knowledge, States track work in flight. Start with context_search."
					.to_string(),
			),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		}
	}
}

/// Serves one session over stdin/stdout until the client disconnects or Ctrl-C arrives.
pub async fn serve_stdio(service: Arc<PimService>) -> Result<()> {
	let running = PimMcp::new(service).serve(stdio()).await?;

	tracing::info!("MCP server ready on stdio.");

	tokio::select! {
		quit = running.waiting() => {
			quit?;
		},
		_ = shutdown_signal() => {},
	}

	Ok(())
}

pub async fn serve_http(
	bind_addr: &str,
	service: Arc<PimService>,
	auth_state: McpAuthState,
) -> Result<()> {
	let bind_addr: SocketAddr = bind_addr.parse()?;
	let session_manager: Arc<LocalSessionManager> = Default::default();
	let mcp = StreamableHttpService::new(
		move || Ok(PimMcp::new(service.clone())),
		session_manager,
		StreamableHttpServerConfig::default(),
	);
	let router = Router::new()
		.fallback_service(mcp)
		.layer(middleware::from_fn_with_state(auth_state, mcp_auth_middleware));
	let listener = TcpListener::bind(bind_addr).await?;

	tracing::info!(%bind_addr, "MCP server listening.");

	axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "Failed to listen for Ctrl-C.");

		std::future::pending::<()>().await;
	}

	tracing::info!("Shutting down.");
}

fn state_summary(state: &PimState) -> CallToolResult {
	CallToolResult::structured(json!({ "state": state.to_summary() }))
}

/// Validation failures become protocol errors; lookup and lifecycle failures are reported as
/// tool errors the agent can act on.
fn service_error(err: pim_service::Error) -> Result<CallToolResult, ErrorData> {
	let kind = match &err {
		pim_service::Error::MissingField { .. } | pim_service::Error::InvalidRequest { .. } =>
			return Err(ErrorData::invalid_params(err.to_string(), None)),
		pim_service::Error::NotFound { .. } => "not_found",
		pim_service::Error::Archived { .. } => "archived",
		pim_service::Error::Conflict { .. } => "conflict",
		pim_service::Error::Storage { .. }
		| pim_service::Error::Index { .. }
		| pim_service::Error::Provider { .. } => {
			tracing::error!(error = %err, "Tool call failed.");

			return Err(ErrorData::internal_error(err.to_string(), None));
		},
	};

	Ok(CallToolResult::structured_error(json!({ "error": kind, "message": err.to_string() })))
}

fn is_authorized(headers: &HeaderMap, auth_state: &McpAuthState) -> bool {
	match auth_state {
		McpAuthState::Off => true,
		McpAuthState::Bearer { token } =>
			read_bearer_token(headers).is_some_and(|candidate| candidate == token),
	}
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(HEADER_AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

fn take_present(params: &mut JsonObject, key: &str) -> Option<Value> {
	params.remove(key).filter(|value| !value.is_null())
}

fn take_required_string(params: &mut JsonObject, key: &str) -> Result<String, ErrorData> {
	let value = take_present(params, key)
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} is required."), None))?;
	let text = value
		.as_str()
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} must be a string."), None))?
		.trim();

	if text.is_empty() {
		return Err(ErrorData::invalid_params(format!("{key} must be non-empty."), None));
	}

	Ok(text.to_string())
}

fn take_optional_string(params: &mut JsonObject, key: &str) -> Result<Option<String>, ErrorData> {
	let Some(value) = take_present(params, key) else { return Ok(None) };
	let text = value
		.as_str()
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} must be a string."), None))?
		.trim();

	if text.is_empty() {
		return Err(ErrorData::invalid_params(format!("{key} must be non-empty."), None));
	}

	Ok(Some(text.to_string()))
}

/// Body text is kept verbatim and may be empty.
fn take_optional_text(params: &mut JsonObject, key: &str) -> Result<Option<String>, ErrorData> {
	match take_present(params, key) {
		None => Ok(None),
		Some(Value::String(text)) => Ok(Some(text)),
		Some(_) => Err(ErrorData::invalid_params(format!("{key} must be a string."), None)),
	}
}

fn take_required_parsed<T>(params: &mut JsonObject, key: &str) -> Result<T, ErrorData>
where
	T: FromStr,
	T::Err: Display,
{
	let raw = take_required_string(params, key)?;

	raw.parse().map_err(|err: T::Err| ErrorData::invalid_params(err.to_string(), None))
}

fn take_optional_parsed<T>(params: &mut JsonObject, key: &str) -> Result<Option<T>, ErrorData>
where
	T: FromStr,
	T::Err: Display,
{
	take_optional_string(params, key)?
		.map(|raw| {
			raw.parse().map_err(|err: T::Err| ErrorData::invalid_params(err.to_string(), None))
		})
		.transpose()
}

fn take_optional_i64(params: &mut JsonObject, key: &str) -> Result<Option<i64>, ErrorData> {
	let Some(value) = take_present(params, key) else { return Ok(None) };
	let number = value
		.as_i64()
		.or_else(|| value.as_f64().filter(|raw| raw.fract() == 0.0).map(|raw| raw as i64))
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} must be an integer."), None))?;

	Ok(Some(number))
}

fn take_optional_count(params: &mut JsonObject, key: &str) -> Result<Option<usize>, ErrorData> {
	take_optional_i64(params, key)?
		.map(|number| {
			usize::try_from(number).map_err(|_| {
				ErrorData::invalid_params(format!("{key} must be a non-negative integer."), None)
			})
		})
		.transpose()
}

fn take_optional_bool(params: &mut JsonObject, key: &str) -> Result<Option<bool>, ErrorData> {
	let Some(value) = take_present(params, key) else { return Ok(None) };

	value
		.as_bool()
		.map(Some)
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} must be a boolean."), None))
}

fn take_string_list(
	params: &mut JsonObject,
	key: &str,
) -> Result<Option<Vec<String>>, ErrorData> {
	let Some(value) = take_present(params, key) else { return Ok(None) };
	let invalid = || ErrorData::invalid_params(format!("{key} must be an array of strings."), None);
	let Value::Array(items) = value else { return Err(invalid()) };

	items
		.into_iter()
		.map(|item| match item {
			Value::String(text) => Ok(text),
			_ => Err(invalid()),
		})
		.collect::<Result<Vec<_>, _>>()
		.map(Some)
}

fn context_search_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["query", "project_id"],
		"properties": {
			"query": { "type": "string" },
			"project_id": { "type": "string" },
			"limit": { "type": ["integer", "null"], "description": "Total results across Stocks and States. Defaults to 10." }
		}
	}))
}

fn stock_manage_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["action"],
		"properties": {
			"action": { "type": "string", "enum": ["create", "read", "update", "delete", "list", "search"] },
			"project_id": { "type": ["string", "null"], "description": "Required for create, list, and search." },
			"stock_id": { "type": ["string", "null"], "description": "Required for read, update, and delete." },
			"category": {
				"type": ["string", "null"],
				"enum": ["design", "rules", "management", "architecture", "requirement", "test", null],
				"description": "Required for create. Filters list."
			},
			"priority": { "type": ["string", "null"], "description": "P0 (highest) to P3. Defaults to P3 on create." },
			"title": { "type": ["string", "null"], "description": "Required for create." },
			"content": { "type": ["string", "null"], "description": "Markdown body." },
			"tags": { "type": ["array", "null"], "items": { "type": "string" } },
			"references": { "type": ["array", "null"], "items": { "type": "string" } },
			"tag": { "type": ["string", "null"], "description": "Filters list by tag." },
			"query": { "type": ["string", "null"], "description": "Search text. Blank ranks every Stock." },
			"limit": { "type": ["integer", "null"] },
			"offset": { "type": ["integer", "null"] }
		}
	}))
}

fn state_manage_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["action"],
		"properties": {
			"action": { "type": "string", "enum": ["create", "read", "update", "archive", "list", "search"] },
			"project_id": { "type": ["string", "null"], "description": "Required for create, list, and search." },
			"state_id": { "type": ["string", "null"], "description": "Required for read, update, and archive." },
			"type": {
				"type": ["string", "null"],
				"enum": ["task", "issue", "incident", "change", null],
				"description": "Required for create. Filters list."
			},
			"status": {
				"type": ["string", "null"],
				"enum": ["open", "in_progress", "resolved", "archived", null],
				"description": "Updates or filters the status. Setting archived archives the State."
			},
			"priority": { "type": ["string", "null"], "description": "P0 (highest) to P3. Defaults to P3 on create." },
			"title": { "type": ["string", "null"], "description": "Required for create." },
			"description": { "type": ["string", "null"] },
			"resolution": { "type": ["string", "null"] },
			"tags": { "type": ["array", "null"], "items": { "type": "string" } },
			"references": { "type": ["array", "null"], "items": { "type": "string" } },
			"include_archived": { "type": ["boolean", "null"] },
			"query": { "type": ["string", "null"], "description": "Search text. Blank ranks every active State." },
			"limit": { "type": ["integer", "null"] },
			"offset": { "type": ["integer", "null"] }
		}
	}))
}

async fn mcp_auth_middleware(
	State(auth_state): State<McpAuthState>,
	req: Request<Body>,
	next: Next,
) -> axum::response::Response {
	if !is_authorized(req.headers(), &auth_state) {
		return (StatusCode::UNAUTHORIZED, "Authentication required with a Bearer token.")
			.into_response();
	}

	next.run(req).await
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use axum::http::HeaderMap;
	use rmcp::model::{CallToolResult, JsonObject};
	use serde_json::{Value, json};

	use super::PimMcp;
	use crate::McpAuthState;
	use pim_domain::SequentialIds;
	use pim_service::PimService;
	use pim_testkit::{BrokenStores, TestStores};

	fn params(value: Value) -> JsonObject {
		match value {
			Value::Object(map) => map,
			other => panic!("Expected an object, got {other}."),
		}
	}

	fn structured(result: &CallToolResult) -> &Value {
		result.structured_content.as_ref().expect("Expected structured content.")
	}

	fn server(stores: &TestStores) -> PimMcp {
		let service = PimService::new(stores.stocks.clone(), stores.states.clone(), None)
			.with_ids(Arc::new(SequentialIds::new()));

		PimMcp::new(Arc::new(service))
	}

	#[test]
	fn registers_all_tools() {
		let tools = PimMcp::tool_router().list_all();
		let mut names = tools.iter().map(|tool| tool.name.to_string()).collect::<Vec<_>>();

		names.sort();

		assert_eq!(names, ["context_search", "state_manage", "stock_manage"]);
	}

	#[test]
	fn off_mode_allows_requests_without_auth_header() {
		let headers = HeaderMap::new();

		assert!(super::is_authorized(&headers, &McpAuthState::Off));
	}

	#[test]
	fn bearer_mode_requires_authorization_header() {
		let mut headers = HeaderMap::new();
		let auth_state = McpAuthState::Bearer { token: "token-a".to_string() };

		assert!(!super::is_authorized(&headers, &auth_state));

		headers
			.insert(super::HEADER_AUTHORIZATION, "Bearer token-a".parse().expect("valid header"));

		assert!(super::is_authorized(&headers, &auth_state));
	}

	#[test]
	fn bearer_mode_rejects_other_schemes_and_tokens() {
		let mut headers = HeaderMap::new();
		let auth_state = McpAuthState::Bearer { token: "token-a".to_string() };

		headers
			.insert(super::HEADER_AUTHORIZATION, "bearer token-a".parse().expect("valid header"));

		assert!(!super::is_authorized(&headers, &auth_state));

		headers
			.insert(super::HEADER_AUTHORIZATION, "Bearer token-b".parse().expect("valid header"));

		assert!(!super::is_authorized(&headers, &auth_state));
	}

	#[test]
	fn parses_optional_params() {
		let mut map = params(json!({
			"limit": 5.0,
			"offset": -1,
			"tags": ["a", "b"],
			"content": "",
			"priority": null
		}));

		assert_eq!(super::take_optional_i64(&mut map, "limit").expect("limit"), Some(5));
		assert!(super::take_optional_count(&mut map, "offset").is_err());
		assert_eq!(
			super::take_string_list(&mut map, "tags").expect("tags"),
			Some(vec!["a".to_string(), "b".to_string()])
		);
		assert_eq!(
			super::take_optional_text(&mut map, "content").expect("content"),
			Some(String::new())
		);
		assert_eq!(
			super::take_optional_parsed::<pim_domain::Priority>(&mut map, "priority")
				.expect("priority"),
			None
		);
	}

	#[test]
	fn required_params_name_the_field() {
		let mut map = params(json!({ "query": "  " }));
		let missing = super::take_required_string(&mut map, "project_id").expect_err("missing");
		let blank = super::take_required_string(&mut map, "query").expect_err("blank");

		assert_eq!(missing.message, "project_id is required.");
		assert_eq!(blank.message, "query must be non-empty.");
	}

	#[tokio::test]
	async fn context_search_validates_before_touching_stores() {
		let stores = Arc::new(BrokenStores::default());
		let service = PimService::new(stores.clone(), stores.clone(), None);
		let mcp = PimMcp::new(Arc::new(service));
		let err = mcp
			.context_search(params(json!({ "query": "deploy" })))
			.await
			.expect_err("Expected a missing project_id error.");

		assert_eq!(err.message, "project_id is required.");
		assert_eq!(stores.calls(), 0);
	}

	#[tokio::test]
	async fn manages_stocks_and_searches_context() {
		let stores = TestStores::new().await.expect("Failed to create stores.");
		let mcp = server(&stores);
		let created = mcp
			.stock_manage(params(json!({
				"action": "create",
				"project_id": "alpha",
				"category": "design",
				"priority": "P0",
				"title": "Deploy pipeline design",
				"content": "Blue green deploys.",
				"tags": ["deploy"]
			})))
			.await
			.expect("Failed to create stock.");
		let stock = &structured(&created)["stock"];

		assert_eq!(stock["id"], "STK-DESIGN-001");
		assert_eq!(stock["priority"], "P0");
		assert!(stock.get("content").is_none());

		mcp.state_manage(params(json!({
			"action": "create",
			"project_id": "alpha",
			"type": "task",
			"title": "Deploy the pipeline"
		})))
		.await
		.expect("Failed to create state.");

		let read = mcp
			.stock_manage(params(json!({ "action": "read", "stock_id": "STK-DESIGN-001" })))
			.await
			.expect("Failed to read stock.");

		assert_eq!(structured(&read)["stock"]["content"], "Blue green deploys.");

		let found = mcp
			.context_search(params(json!({ "query": "DEPLOY", "project_id": "alpha" })))
			.await
			.expect("Failed to search.");
		let body = structured(&found);

		assert_eq!(body["total"], 2);
		assert_eq!(body["stocks"][0]["id"], "STK-DESIGN-001");
		assert_eq!(body["states"][0]["priority"], "P3");
	}

	#[tokio::test]
	async fn archived_states_report_tool_errors() {
		let stores = TestStores::new().await.expect("Failed to create stores.");
		let mcp = server(&stores);
		let created = mcp
			.state_manage(params(json!({
				"action": "create",
				"project_id": "alpha",
				"type": "issue",
				"priority": "P1",
				"title": "Flaky test"
			})))
			.await
			.expect("Failed to create state.");
		let id = structured(&created)["state"]["id"].as_str().expect("id").to_string();
		let archive = json!({ "action": "archive", "state_id": id, "resolution": "fixed" });

		mcp.state_manage(params(archive.clone())).await.expect("Failed to archive.");

		let again = mcp.state_manage(params(archive)).await.expect("Expected a tool result.");

		assert_eq!(again.is_error, Some(true));
		assert_eq!(structured(&again)["error"], "archived");

		let listed = mcp
			.state_manage(params(json!({ "action": "list", "project_id": "alpha" })))
			.await
			.expect("Failed to list states.");

		assert_eq!(structured(&listed)["total"], 0);

		let missing = mcp
			.stock_manage(params(json!({ "action": "read", "stock_id": "STK-DESIGN-404" })))
			.await
			.expect("Expected a tool result.");

		assert_eq!(structured(&missing)["error"], "not_found");
	}

	#[tokio::test]
	async fn rejects_unknown_actions_and_values() {
		let stores = TestStores::new().await.expect("Failed to create stores.");
		let mcp = server(&stores);
		let unknown = mcp
			.stock_manage(params(json!({ "action": "archive" })))
			.await
			.expect_err("Expected an unknown action error.");

		assert!(unknown.message.contains("Unknown action archive"));

		let invalid = mcp
			.state_manage(params(json!({
				"action": "create",
				"project_id": "alpha",
				"type": "epic",
				"title": "Roadmap"
			})))
			.await
			.expect_err("Expected an invalid type error.");

		assert!(invalid.message.contains("epic"), "unexpected error: {}", invalid.message);
	}
}
