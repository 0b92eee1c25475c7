// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::categorize::classifier::DynScorer;
use crate::categorize::{Categorization, Categorizer};
use crate::config::Settings;
use crate::ingest::raw::{transform, RawEvent};
use crate::ingest::{IngestPipeline, IngestReport};
use crate::logging::anon_hash;
use crate::model::{ComponentVectorSet, OnboardingAnswers};
use crate::profile::{ProfileBuilder, ProfileService};
use crate::recommend::{Ranker, Recommender};
use crate::store::DynStore;
use crate::vectorize::FieldVectorizer;

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub categorizer: Arc<Categorizer>,
    pub pipeline: Arc<IngestPipeline>,
    pub profiles: Arc<ProfileService>,
    pub recommender: Arc<Recommender>,
}

impl AppState {
    /// Wire every service onto one shared store.
    pub fn build(
        settings: &Settings,
        store: DynStore,
        category_model: DynScorer,
        genre_model: DynScorer,
    ) -> anyhow::Result<Self> {
        let categorizer = Arc::new(Categorizer::new(settings, category_model, genre_model)?);
        let pipeline = Arc::new(IngestPipeline::new(
            store.clone(),
            categorizer.clone(),
            FieldVectorizer::new(&settings.catalog),
        ));
        let builder = Arc::new(ProfileBuilder::new(&settings.catalog, &settings.profile));
        let profiles = Arc::new(ProfileService::new(store.clone(), builder));
        let recommender = Arc::new(Recommender::new(
            store.clone(),
            profiles.clone(),
            Ranker::new(settings),
        ));
        Ok(Self {
            store,
            categorizer,
            pipeline,
            profiles,
            recommender,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/events", post(ingest_events))
        .route("/categorize", post(categorize))
        .route("/users/{id}/onboarding", put(put_onboarding))
        .route("/users/{id}/profile/init", post(profile_init))
        .route("/users/{id}/profile/update", post(profile_update))
        .route("/users/{id}/likes", post(record_like))
        .route("/users/{id}/recommendations", get(recommendations))
        .route("/users/{id}/similar", get(similar))
        .route("/admin/cleanup", post(admin_cleanup))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

#[derive(Serialize)]
struct ErrorResp {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::Internal(e) => {
                tracing::error!(target: "api", error = ?e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorResp { error })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Deserialize)]
struct TopNQuery {
    #[serde(default)]
    top_n: Option<usize>,
}

async fn ingest_events(
    State(state): State<AppState>,
    Json(batch): Json<Vec<RawEvent>>,
) -> ApiResult<IngestReport> {
    Ok(Json(state.pipeline.run(batch).await?))
}

/// Either free text or a raw upstream event; `threshold` overrides the configured cutoff.
#[derive(Deserialize)]
struct CategorizeReq {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    event: Option<RawEvent>,
    #[serde(default)]
    threshold: Option<f64>,
}

async fn categorize(
    State(state): State<AppState>,
    Json(body): Json<CategorizeReq>,
) -> ApiResult<Categorization> {
    let normalizer = state.categorizer.normalizer();
    let text = match (&body.event, &body.text) {
        (Some(raw), _) => {
            let event = transform(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            normalizer.normalize_event(&event)
        }
        (None, Some(text)) => normalizer.normalize(&[Some(text.as_str())]),
        (None, None) => return Err(ApiError::BadRequest("expected `text` or `event`".into())),
    };
    let threshold = body
        .threshold
        .unwrap_or_else(|| state.categorizer.threshold());
    Ok(Json(state.categorizer.categorize_with_threshold(&text, threshold)))
}

async fn put_onboarding(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(answers): Json<OnboardingAnswers>,
) -> Result<StatusCode, ApiError> {
    state.store.put_onboarding(&user_id, answers).await?;
    tracing::info!(target: "api", user = %anon_hash(&user_id), "onboarding stored");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct ProfileResp {
    user_id: String,
    updated: bool,
    component_profile_vectors: Option<ComponentVectorSet>,
}

async fn profile_init(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ProfileResp> {
    let Some(vectors) = state.profiles.build_initial(&user_id).await? else {
        return Err(ApiError::NotFound(format!("no onboarding answers for user {user_id}")));
    };
    Ok(Json(ProfileResp {
        user_id,
        updated: true,
        component_profile_vectors: Some(vectors),
    }))
}

async fn profile_update(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ProfileResp> {
    let vectors = state.profiles.reaggregate(&user_id).await?;
    Ok(Json(ProfileResp {
        user_id,
        updated: vectors.is_some(),
        component_profile_vectors: vectors,
    }))
}

#[derive(Deserialize)]
struct LikeReq {
    event_id: String,
    #[serde(default)]
    liked_at: Option<DateTime<Utc>>,
}

async fn record_like(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<LikeReq>,
) -> ApiResult<ProfileResp> {
    let liked_at = body.liked_at.unwrap_or_else(Utc::now);
    let Some(vectors) = state
        .profiles
        .record_like(&user_id, &body.event_id, liked_at)
        .await?
    else {
        return Err(ApiError::NotFound(format!("unknown event {}", body.event_id)));
    };
    Ok(Json(ProfileResp {
        user_id,
        updated: true,
        component_profile_vectors: Some(vectors),
    }))
}

#[derive(Serialize)]
struct RecommendationsResp {
    user_id: String,
    event_ids: Vec<String>,
}

async fn recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<TopNQuery>,
) -> ApiResult<RecommendationsResp> {
    let event_ids = state.recommender.recommend(&user_id, q.top_n).await?;
    Ok(Json(RecommendationsResp { user_id, event_ids }))
}

#[derive(Serialize)]
struct SimilarResp {
    event_ids: Vec<String>,
    reference_event_id: Option<String>,
}

async fn similar(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<TopNQuery>,
) -> ApiResult<SimilarResp> {
    let resp = match state
        .recommender
        .similar_to_last_liked(&user_id, q.top_n)
        .await?
    {
        Some(s) => SimilarResp {
            event_ids: s.event_ids,
            reference_event_id: Some(s.reference_event_id),
        },
        None => SimilarResp {
            event_ids: Vec::new(),
            reference_event_id: None,
        },
    };
    Ok(Json(resp))
}

#[derive(Serialize)]
struct CleanupResp {
    deleted: usize,
}

async fn admin_cleanup(State(state): State<AppState>) -> ApiResult<CleanupResp> {
    let now = chrono::Local::now().naive_local();
    let deleted = state.pipeline.purge_expired(now).await?;
    Ok(Json(CleanupResp { deleted }))
}
