pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
	#[error("Invalid priority {value:?}: must be P0, P1, P2, or P3.")]
	InvalidPriority { value: String },
	#[error(
		"Invalid category {value:?}: must be one of design, rules, management, architecture, requirement, or test."
	)]
	InvalidCategory { value: String },
	#[error("Invalid state type {value:?}: must be one of task, issue, incident, or change.")]
	InvalidStateType { value: String },
	#[error("Invalid status {value:?}: must be one of open, in_progress, resolved, or archived.")]
	InvalidStatus { value: String },
	#[error("State {id} is already archived.")]
	AlreadyArchived { id: String },
}
