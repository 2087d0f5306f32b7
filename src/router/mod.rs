// Router module - route decoding, validation, and the execution plane
// This file wires together the codec, the pre-flight guards, gas
// estimation, and the execution engine

pub mod codec;
pub mod execution;
pub mod gas;
pub mod routes;
pub mod validation;

pub use codec::{decode, encode};
pub use execution::{
    EngineConfig, ExecutionEngine, ExecutionRequest, ExecutionState, RouteSource,
};
pub use gas::{GasConfig, GasEstimator};
pub use routes::{ActionKind, DecodedRoute, PoolPayload, RouteHop, SubRoute};
pub use validation::validate_before_execution;
