// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Structured JSON logging setup for hosts embedding the session.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a JSON `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. Returns an error if a global
/// subscriber is already installed.
pub fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rh_session=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init()?;
    Ok(())
}
