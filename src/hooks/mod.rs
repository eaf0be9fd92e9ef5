pub mod api;
pub mod types;

pub use api::HookApi;
pub use types::{
    HealthResponse, HookResponse, HookResult, PublishRequest, RegisterRequest, SubscribeRequest,
    SubscribeTopic,
};
