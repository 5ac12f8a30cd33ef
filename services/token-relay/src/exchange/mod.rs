//! Authorization-code exchange pipeline.

pub mod orchestrator;
pub mod request;
pub mod stage;
pub mod upstream;

pub use orchestrator::TokenExchange;
pub use request::{TokenGrant, TokenRequest};
pub use stage::ExchangeStage;
pub use upstream::UpstreamClient;
