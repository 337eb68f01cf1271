const STATES_SQL: &str = include_str!("../../../sql/states.sql");

/// Idempotent DDL statements for the State database, in execution order.
pub fn statements() -> impl Iterator<Item = &'static str> {
	STATES_SQL.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}
