use crate::error::ApiError;
use crate::store::RatingStore;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use calico_proto::ratings::{
    HealthResponse, Rating, RatingsQuery, RatingsResponse, SubmitAck, HEALTH_PATH, RATINGS_PATH,
};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

const QUERY_REQUIRED: &str = "artist and title are required";
const SUBMIT_REQUIRED: &str = "artist, title, listener_id, and rating (1 or -1) are required";

#[derive(Clone)]
struct HttpState {
    store: RatingStore,
}

/// POST body as received.  Every field is optional here so that a missing
/// field is reported as a 400 with our own message instead of a
/// deserialisation rejection.
#[derive(Debug, Deserialize)]
struct SubmitRatingBody {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    listener_id: Option<String>,
    #[serde(default)]
    rating: Option<serde_json::Value>,
}

pub fn router(store: RatingStore, static_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route(HEALTH_PATH, get(health))
        .route(RATINGS_PATH, get(get_ratings).post(submit_rating))
        .with_state(HttpState { store });

    match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    }
}

/// Bind and serve until ctrl-c.  A bind or serve failure is the task's
/// result so the binary can exit non-zero.
pub fn start_server(
    bind_address: String,
    port: u16,
    app: Router,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}", addr, e);
            anyhow::anyhow!("failed to bind {}: {}", addr, e)
        })?;

        info!("Server running at http://{}", addr);

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                error!("HTTP server error: {}", e);
                anyhow::anyhow!("HTTP server error: {}", e)
            })
    })
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.store.db_time().await {
        Ok(db_time) => Json(HealthResponse {
            status: "ok".to_string(),
            db_time,
        })
        .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn get_ratings(
    State(state): State<HttpState>,
    Query(query): Query<RatingsQuery>,
) -> Result<Json<RatingsResponse>, ApiError> {
    let (Some(artist), Some(title)) = (non_empty(&query.artist), non_empty(&query.title)) else {
        info!("HTTP API: GET ratings rejected: missing artist or title");
        return Err(ApiError::BadRequest(QUERY_REQUIRED.to_string()));
    };
    debug!("HTTP API: GET ratings {} / {}", artist, title);

    let listener_id = non_empty(&query.listener_id);
    let ratings = state.store.ratings(artist, title, listener_id).await?;
    Ok(Json(ratings))
}

async fn submit_rating(
    State(state): State<HttpState>,
    payload: Result<Json<SubmitRatingBody>, JsonRejection>,
) -> Result<Json<SubmitAck>, ApiError> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            info!("HTTP API: POST ratings rejected: {}", rejection.body_text());
            return Err(ApiError::BadRequest(SUBMIT_REQUIRED.to_string()));
        }
    };

    let rating = body.rating.as_ref().and_then(parse_rating);
    let (Some(artist), Some(title), Some(listener_id), Some(rating)) = (
        non_empty(&body.artist),
        non_empty(&body.title),
        non_empty(&body.listener_id),
        rating,
    ) else {
        info!("HTTP API: POST ratings rejected: {:?}", body);
        return Err(ApiError::BadRequest(SUBMIT_REQUIRED.to_string()));
    };

    info!(
        "HTTP API: rating {} for {} / {} from {}",
        rating.value(),
        artist,
        title,
        listener_id
    );
    state.store.upsert(artist, title, listener_id, rating).await?;
    Ok(Json(SubmitAck { ok: true }))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// JSON numbers compare by value, so `1.0` is as good as `1`.  Strings and
/// anything other than exactly one or minus one are rejected.
fn parse_rating(value: &serde_json::Value) -> Option<Rating> {
    let n = value.as_f64()?;
    if n == 1.0 {
        Some(Rating::Up)
    } else if n == -1.0 {
        Some(Rating::Down)
    } else {
        None
    }
}
