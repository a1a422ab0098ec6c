use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] beacon_engine_rpc::RpcError),

    #[error("Core error: {0}")]
    Core(#[from] beacon_engine_core::CoreError),
}
