use time::OffsetDateTime;

use crate::{PimService, Result, ScoredStock};
use pim_domain::{EntityKind, Priority, Stock, StockCategory, StockSummary};
use pim_storage::StockListOptions;

#[derive(Clone, Debug)]
pub struct CreateStockInput {
	pub project_id: String,
	pub category: StockCategory,
	pub priority: Priority,
	pub title: String,
	pub content: String,
	pub tags: Vec<String>,
	pub references: Vec<String>,
}

/// Fields left as `None` keep their stored value.
#[derive(Clone, Debug, Default)]
pub struct UpdateStockInput {
	pub title: Option<String>,
	pub content: Option<String>,
	pub priority: Option<Priority>,
	pub tags: Option<Vec<String>>,
	pub references: Option<Vec<String>>,
}

impl PimService {
	pub async fn create_stock(&self, input: CreateStockInput) -> Result<Stock> {
		crate::require("project_id", &input.project_id)?;
		crate::require("title", &input.title)?;

		let now = OffsetDateTime::now_utc();
		let stock = Stock {
			id: self.ids.stock_id(input.category),
			project_id: input.project_id,
			category: input.category,
			priority: input.priority,
			title: input.title,
			content: input.content,
			tags: input.tags,
			references: input.references,
			created_at: now,
			updated_at: now,
		};

		self.stocks.create(&stock).await?;
		self.index_stock(&stock).await;

		Ok(stock)
	}

	pub async fn get_stock(&self, id: &str) -> Result<Stock> {
		crate::require("id", id)?;

		Ok(self.stocks.get(id).await?)
	}

	pub async fn update_stock(&self, id: &str, input: UpdateStockInput) -> Result<Stock> {
		let mut stock = self.get_stock(id).await?;

		if let Some(title) = input.title {
			crate::require("title", &title)?;

			stock.title = title;
		}
		if let Some(content) = input.content {
			stock.content = content;
		}
		if let Some(priority) = input.priority {
			stock.priority = priority;
		}
		if let Some(tags) = input.tags {
			stock.tags = tags;
		}
		if let Some(references) = input.references {
			stock.references = references;
		}

		stock.updated_at = OffsetDateTime::now_utc();

		self.stocks.update(&stock).await?;
		self.index_stock(&stock).await;

		Ok(stock)
	}

	pub async fn delete_stock(&self, id: &str) -> Result<()> {
		crate::require("id", id)?;

		self.stocks.delete(id).await?;
		self.unindex(id).await;

		Ok(())
	}

	pub async fn list_stocks(&self, project_id: &str, opts: &StockListOptions) -> Result<Vec<Stock>> {
		crate::require("project_id", project_id)?;

		Ok(self.stocks.list(project_id, opts).await?)
	}

	pub async fn list_stock_summaries(
		&self,
		project_id: &str,
		opts: &StockListOptions,
	) -> Result<Vec<StockSummary>> {
		let stocks = self.list_stocks(project_id, opts).await?;

		Ok(stocks.iter().map(Stock::to_summary).collect())
	}

	/// Retrieval restricted to Stocks. A blank query ranks every Stock of the project.
	pub async fn search_stocks(
		&self,
		project_id: &str,
		query: &str,
		limit: Option<i64>,
	) -> Result<Vec<ScoredStock>> {
		crate::require("project_id", project_id)?;

		let limit = self.settings.resolve_limit(limit);
		let response = self.retrieve(query, project_id, limit, Some(EntityKind::Stock)).await?;

		Ok(response.stocks)
	}
}
