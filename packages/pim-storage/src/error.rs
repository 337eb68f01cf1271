#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Already exists: {0}")]
	AlreadyExists(String),
	/// The record is archived and rejects further writes. Carries the record id.
	#[error("Archived: {0}")]
	Archived(String),
	#[error("Corrupt record: {0}")]
	Corrupt(String),
	#[error("Index error: {0}")]
	Index(String),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
}
impl Error {
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
