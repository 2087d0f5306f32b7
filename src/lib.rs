// Library root module for ultra-router
// This file defines the public API and module structure for the
// route decoding, validation, and execution core

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

pub mod chain;
pub mod classify;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod quote;
pub mod router;
pub mod transport;

pub use chain::{ChainClient, InvalidationScope, ReceiptClient, WalletClient};
pub use classify::classify;
pub use errors::{DomainError, ErrorCode};
pub use quote::Quote;
pub use router::codec::decode as decode_route;
pub use router::codec::encode as encode_route;
pub use router::execution::{
    EngineConfig, ExecutionEngine, ExecutionRequest, ExecutionState, RouteSource,
};
pub use router::routes::DecodedRoute;
pub use router::validation::validate_before_execution;

/// Install the default tracing subscriber (env-filtered, no targets).
pub fn init_tracing() -> anyhow::Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
