// Transport layer module
// Concrete collaborator implementations over the wire

pub mod jsonrpc;

pub use jsonrpc::EvmJsonRpc;
