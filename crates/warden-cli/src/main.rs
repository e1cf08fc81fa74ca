// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden administrative binary.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_config::{load_config, load_config_with_file, LoggingConfig};
use warden_core::AuthorizationContext;
use warden_db::{create_pool, RbacRepository};

mod cli;
mod commands;

use cli::Args;
use commands::Admin;

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	// stdout carries command output, so logs go to stderr
	if logging.json {
		registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.init();
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init();
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};

	init_tracing(&config.logging);

	let guard = args
		.guard
		.clone()
		.unwrap_or_else(|| config.authz.default_guard.clone());
	tracing::debug!(
		database = %config.database.url,
		guard = %guard,
		"starting warden"
	);

	let pool = create_pool(&config.database.url).await?;
	let admin = Admin::new(
		RbacRepository::new(pool),
		AuthorizationContext::new(guard),
		config.authz,
	);

	let mut stdout = std::io::stdout().lock();
	let outcome = admin.execute(args.command, &mut stdout).await?;
	Ok(outcome.exit_code())
}
