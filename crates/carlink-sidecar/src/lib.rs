pub mod client;
pub mod protocol;

pub use client::SidecarClient;
pub use protocol::Endpoints;
