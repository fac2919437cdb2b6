// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - token lifecycle and authenticated requests.

pub mod executor;
pub mod refresher;
pub mod session;
pub mod token_store;

pub use executor::{AuthenticatedRequestExecutor, RequestSpec};
pub use refresher::{RefreshEndpoint, RefreshOutcome, TokenRefresher};
pub use session::AuthSession;
pub use token_store::TokenStore;
