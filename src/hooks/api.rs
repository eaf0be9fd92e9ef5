use super::types::{
    ErrorResponse, HealthResponse, HookResponse, PublishRequest, RegisterRequest, SubscribeRequest,
};
use crate::error::AuthHookError;
use crate::security::SecurityManager;
use crate::Result;

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest webhook body accepted from the broker
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Webhook HTTP server answering the broker's auth callbacks
pub struct HookApi {
    manager: Arc<SecurityManager>,
    listen: SocketAddr,
    start_time: Instant,
}

impl HookApi {
    pub fn new(manager: Arc<SecurityManager>, listen: SocketAddr) -> Self {
        Self {
            manager,
            listen,
            start_time: Instant::now(),
        }
    }

    /// All webhook routes, with rejections turned into JSON errors
    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let manager = self.manager.clone();

        let register = warp::path("auth_on_register")
            .and(warp::path::end())
            .and(warp::post())
            .and(json_body::<RegisterRequest>())
            .and(with_manager(manager.clone()))
            .and_then(handle_register);

        let publish = warp::path("auth_on_publish")
            .and(warp::path::end())
            .and(warp::post())
            .and(json_body::<PublishRequest>())
            .and(with_manager(manager.clone()))
            .and_then(handle_publish);

        let subscribe = warp::path("auth_on_subscribe")
            .and(warp::path::end())
            .and(warp::post())
            .and(json_body::<SubscribeRequest>())
            .and(with_manager(manager.clone()))
            .and_then(handle_subscribe);

        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_start_time(self.start_time))
            .and_then(handle_health);

        let metrics = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_manager(manager))
            .and_then(handle_metrics);

        register
            .or(publish)
            .or(subscribe)
            .or(health)
            .or(metrics)
            .with(warp::trace::request())
            .recover(handle_rejection)
    }

    /// Serve until the process receives ctrl-c
    pub async fn start(&self) -> Result<()> {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves
    pub async fn serve_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (addr, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(self.listen, shutdown)
            .map_err(|e| AuthHookError::Internal(format!("failed to bind {}: {}", self.listen, e)))?;

        info!("Starting webhook server on {}", addr);
        server.await;
        info!("Webhook server stopped");

        Ok(())
    }
}

/// Warp filter to inject the security manager
fn with_manager(
    manager: Arc<SecurityManager>,
) -> impl Filter<Extract = (Arc<SecurityManager>,), Error = Infallible> + Clone {
    warp::any().map(move || manager.clone())
}

/// Warp filter to inject start time for uptime calculation
fn with_start_time(
    start_time: Instant,
) -> impl Filter<Extract = (Instant,), Error = Infallible> + Clone {
    warp::any().map(move || start_time)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

async fn handle_register(
    request: RegisterRequest,
    manager: Arc<SecurityManager>,
) -> std::result::Result<impl Reply, Rejection> {
    debug!(
        username = %request.username,
        client_id = %request.client_id,
        peer_addr = request.peer_addr.as_deref().unwrap_or(""),
        "auth_on_register"
    );

    let verdict = manager
        .authorize_register(&request.username, &request.password)
        .await;

    Ok(warp::reply::json(&HookResponse::from(&verdict)))
}

async fn handle_publish(
    request: PublishRequest,
    manager: Arc<SecurityManager>,
) -> std::result::Result<impl Reply, Rejection> {
    debug!(
        username = %request.username,
        client_id = %request.client_id,
        topic = %request.topic,
        "auth_on_publish"
    );

    let verdict = manager.authorize_publish(&request.username, &request.topic);

    Ok(warp::reply::json(&HookResponse::from(&verdict)))
}

async fn handle_subscribe(
    request: SubscribeRequest,
    manager: Arc<SecurityManager>,
) -> std::result::Result<impl Reply, Rejection> {
    debug!(
        username = %request.username,
        client_id = %request.client_id,
        topics = request.topics.len(),
        "auth_on_subscribe"
    );

    let verdict = manager.authorize_subscribe(&request.username, &request.topic_filters());

    Ok(warp::reply::json(&HookResponse::from(&verdict)))
}

async fn handle_health(start_time: Instant) -> std::result::Result<impl Reply, Rejection> {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
    };

    Ok(warp::reply::json(&response))
}

async fn handle_metrics(
    manager: Arc<SecurityManager>,
) -> std::result::Result<warp::reply::Response, Rejection> {
    match manager.metrics().gather_text() {
        Ok(text) => Ok(warp::reply::with_header(
            text,
            "content-type",
            "text/plain; version=0.0.4",
        )
        .into_response()),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            let json = warp::reply::json(&ErrorResponse {
                error: "Failed to render metrics".to_string(),
            });
            Ok(warp::reply::with_status(json, StatusCode::INTERNAL_SERVER_ERROR).into_response())
        }
    }
}

/// Handle warp rejections
async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found";
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid JSON body";
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload Too Large";
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported Media Type";
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed";
    } else {
        error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error";
    }

    let json = warp::reply::json(&ErrorResponse {
        error: message.to_string(),
    });

    Ok(warp::reply::with_status(json, code))
}
