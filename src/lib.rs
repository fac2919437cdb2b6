// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! RH session: client-side authentication for the RH incidence system
//!
//! This crate keeps the Supabase session of a school staff member on
//! disk, refreshes it when the backend answers 401, and sends authenticated
//! requests to the RH API with at most one refresh-and-retry per call.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{AuthError, StorageError};
pub use services::{AuthSession, RequestSpec};
