use std::path::PathBuf;

use clap::{
	Args,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

/// Options every PIM binary accepts.
#[derive(Debug, Args)]
pub struct CommonArgs {
	/// TOML config file. Built-in defaults and `PIM_*` environment overrides apply without one.
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: Option<PathBuf>,
	/// Override `storage.data_dir`.
	#[arg(long, value_name = "DIR")]
	pub data_dir: Option<PathBuf>,
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Red.on_default() | Effects::BOLD)
		.usage(AnsiColor::Red.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}
