//! Chain read seam used by the pipeline stages.

mod api;
pub use api::ChainApi;

mod rpc;
pub use rpc::RpcChainApi;
