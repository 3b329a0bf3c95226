pub mod config;
pub mod error;
pub mod types;

pub use config::SidecarConfig;
pub use error::{Result, SidecarError};
pub use types::{
    HttpCallRequest, HttpCallResponse, MicroError, RpcRequest, RpcResponse, ServiceDescriptor,
    ServiceNode,
};
