pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{field} is required.")]
	MissingField { field: &'static str },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("State {id} is archived.")]
	Archived { id: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
}
impl From<pim_storage::Error> for Error {
	fn from(err: pim_storage::Error) -> Self {
		match err {
			pim_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			pim_storage::Error::NotFound(message) => Self::NotFound { message },
			pim_storage::Error::AlreadyExists(message) => Self::Conflict { message },
			pim_storage::Error::Archived(id) => Self::Archived { id },
			pim_storage::Error::Index(message) => Self::Index { message },
			pim_storage::Error::Qdrant(inner) => Self::Index { message: inner.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<pim_domain::Error> for Error {
	fn from(err: pim_domain::Error) -> Self {
		match err {
			pim_domain::Error::AlreadyArchived { id } => Self::Archived { id },
			other => Self::InvalidRequest { message: other.to_string() },
		}
	}
}

impl From<pim_providers::Error> for Error {
	fn from(err: pim_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
