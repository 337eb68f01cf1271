use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use tokio::fs;
use uuid::Uuid;

use crate::{BoxFuture, Error, Result, StockListOptions, StockStore};
use pim_domain::Stock;

const RECORD_EXTENSION: &str = "json";

/// Stores each Stock as a pretty-printed JSON document at `<dir>/<id>.json`.
///
/// Writes land in a uniquely named temp file first and are then moved into place, so readers
/// only ever see complete documents.
#[derive(Clone, Debug)]
pub struct FileStockStore {
	dir: PathBuf,
}
impl FileStockStore {
	pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();

		fs::create_dir_all(&dir).await?;

		Ok(Self { dir })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn record_path(&self, id: &str) -> Result<PathBuf> {
		validate_id(id)?;

		Ok(self.dir.join(format!("{id}.{RECORD_EXTENSION}")))
	}

	fn temp_path(&self, id: &str) -> PathBuf {
		self.dir.join(format!(".{id}.{}.tmp", Uuid::new_v4().simple()))
	}

	async fn write_temp(&self, stock: &Stock) -> Result<PathBuf> {
		let payload = serde_json::to_vec_pretty(stock)?;
		let temp = self.temp_path(&stock.id);

		fs::write(&temp, payload).await?;

		Ok(temp)
	}

	async fn create_record(&self, stock: &Stock) -> Result<()> {
		let path = self.record_path(&stock.id)?;
		let temp = self.write_temp(stock).await?;
		// Linking fails when the target exists, which makes the existence check atomic.
		let linked = fs::hard_link(&temp, &path).await;
		let _ = fs::remove_file(&temp).await;

		match linked {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == ErrorKind::AlreadyExists =>
				Err(Error::AlreadyExists(format!("stock {}", stock.id))),
			Err(err) => Err(err.into()),
		}
	}

	async fn read_record(&self, id: &str) -> Result<Stock> {
		let path = self.record_path(id)?;
		let raw = match fs::read(&path).await {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound =>
				return Err(Error::NotFound(format!("stock {id}"))),
			Err(err) => return Err(err.into()),
		};

		Ok(serde_json::from_slice(&raw)?)
	}

	async fn update_record(&self, stock: &Stock) -> Result<()> {
		let path = self.record_path(&stock.id)?;

		if !fs::try_exists(&path).await? {
			return Err(Error::NotFound(format!("stock {}", stock.id)));
		}

		let temp = self.write_temp(stock).await?;

		if let Err(err) = fs::rename(&temp, &path).await {
			let _ = fs::remove_file(&temp).await;

			return Err(err.into());
		}

		Ok(())
	}

	async fn delete_record(&self, id: &str) -> Result<()> {
		let path = self.record_path(id)?;

		match fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == ErrorKind::NotFound =>
				Err(Error::NotFound(format!("stock {id}"))),
			Err(err) => Err(err.into()),
		}
	}

	async fn list_records(&self, project_id: &str, opts: &StockListOptions) -> Result<Vec<Stock>> {
		let mut entries = fs::read_dir(&self.dir).await?;
		let mut stocks = Vec::new();

		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();

			if !is_record_file(&path) {
				continue;
			}

			let stock = match read_document(&path).await {
				Ok(stock) => stock,
				Err(err) => {
					tracing::warn!(
						path = %path.display(),
						error = %err,
						"Skipping unreadable stock file."
					);

					continue;
				},
			};

			if matches_filters(&stock, project_id, opts) {
				stocks.push(stock);
			}
		}

		stocks.sort_by(|a, b| {
			a.priority
				.cmp(&b.priority)
				.then_with(|| b.updated_at.cmp(&a.updated_at))
				.then_with(|| a.id.cmp(&b.id))
		});

		let limit = opts.limit.unwrap_or(usize::MAX);

		Ok(stocks.into_iter().skip(opts.offset).take(limit).collect())
	}
}
impl StockStore for FileStockStore {
	fn create<'a>(&'a self, stock: &'a Stock) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.create_record(stock))
	}

	fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Stock>> {
		Box::pin(self.read_record(id))
	}

	fn update<'a>(&'a self, stock: &'a Stock) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.update_record(stock))
	}

	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_record(id))
	}

	fn list<'a>(
		&'a self,
		project_id: &'a str,
		opts: &'a StockListOptions,
	) -> BoxFuture<'a, Result<Vec<Stock>>> {
		Box::pin(self.list_records(project_id, opts))
	}
}

fn validate_id(id: &str) -> Result<()> {
	let valid = !id.is_empty()
		&& !id.starts_with('.')
		&& id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

	if valid { Ok(()) } else { Err(Error::InvalidArgument(format!("invalid stock id {id:?}"))) }
}

fn is_record_file(path: &Path) -> bool {
	let hidden = path
		.file_name()
		.and_then(|name| name.to_str())
		.map(|name| name.starts_with('.'))
		.unwrap_or(true);

	!hidden && path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION)
}

async fn read_document(path: &Path) -> Result<Stock> {
	let raw = fs::read(path).await?;

	Ok(serde_json::from_slice(&raw)?)
}

fn matches_filters(stock: &Stock, project_id: &str, opts: &StockListOptions) -> bool {
	if !project_id.is_empty() && stock.project_id != project_id {
		return false;
	}
	if opts.category.is_some_and(|category| stock.category != category) {
		return false;
	}
	if opts.priority.is_some_and(|priority| stock.priority != priority) {
		return false;
	}
	if let Some(tag) = opts.tag.as_deref()
		&& !stock.tags.iter().any(|candidate| candidate == tag)
	{
		return false;
	}

	true
}
