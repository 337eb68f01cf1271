use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Importance tier shared by Stock and State records. `P0` is the most important, and the
/// derived ordering sorts it first.
#[derive(
	Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
	P0,
	P1,
	P2,
	#[default]
	P3,
}
impl Priority {
	pub const ALL: [Self; 4] = [Self::P0, Self::P1, Self::P2, Self::P3];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::P0 => "P0",
			Self::P1 => "P1",
			Self::P2 => "P2",
			Self::P3 => "P3",
		}
	}

	/// Zero for the highest tier.
	pub fn rank(self) -> u8 {
		self as u8
	}

	pub fn from_rank(rank: i64) -> Option<Self> {
		match rank {
			0 => Some(Self::P0),
			1 => Some(Self::P1),
			2 => Some(Self::P2),
			3 => Some(Self::P3),
			_ => None,
		}
	}
}
impl fmt::Display for Priority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Priority {
	type Err = Error;

	/// Accepts tier names (`P0`..`P3`) and the descriptive aliases `highest`, `high`, `medium`,
	/// `low`, and `lowest`.
	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"p0" | "highest" | "critical" => Ok(Self::P0),
			"p1" | "high" => Ok(Self::P1),
			"p2" | "medium" => Ok(Self::P2),
			"p3" | "low" | "lowest" => Ok(Self::P3),
			_ => Err(Error::InvalidPriority { value: raw.to_string() }),
		}
	}
}
