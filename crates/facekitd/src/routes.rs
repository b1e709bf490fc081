//! HTTP JSON API.
//!
//! Face registration, AI-backed recognition and analysis, summarization,
//! history listings, and a local image similarity check.

use crate::config::Config;
use crate::error::ApiError;
use crate::gemini::{AiError, GeminiClient, Part};
use crate::prompts::{self, AiScore, FaceAnalysis};
use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use facekit_core::preprocess::{self, PreprocessError};
use facekit_core::types::round2;
use facekit_core::ScoringConfig;
use facekit_store::{Dataset, FaceStore, FaceWithUser, NewFace, NewSummary, Stats, SummaryRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Everything the handlers share.
pub struct AppState {
    pub store: FaceStore,
    pub dataset: Dataset,
    pub ai: GeminiClient,
    pub scoring: ScoringConfig,
    /// Minimum AI confidence (0–100) for a recognition match.
    pub match_threshold: f64,
}

impl AppState {
    /// Open the database, prepare the dataset directory and build the AI client.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = FaceStore::open(&config.db_path).await?;
        let dataset = Dataset::new(&config.dataset_dir);
        dataset.ensure().await?;
        tracing::info!(dir = %config.dataset_dir.display(), "face dataset ready");

        let ai = GeminiClient::new(&config.gemini)?;
        if config.gemini.api_key.is_none() {
            tracing::warn!("no Gemini API key configured; AI endpoints will fail");
        }

        Ok(Self {
            store,
            dataset,
            ai,
            scoring: config.scoring.clone(),
            match_threshold: config.match_threshold,
        })
    }
}

/// Build the router with all endpoints.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/faces", get(list_faces))
        .route("/api/summaries", get(list_summaries))
        .route("/api/register-face", post(register_face))
        .route("/api/recognize-face", post(recognize_face))
        .route("/api/analyze-face", post(analyze_face))
        .route("/api/summarize", post(summarize))
        .route("/api/compare-faces", post(compare_faces))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// ── Multipart helpers ───────────────────────────────────────────

struct Upload {
    bytes: Bytes,
    content_type: Option<String>,
}

#[derive(Default)]
struct Form {
    texts: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl Form {
    fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn file(&self, name: &str) -> Option<&Upload> {
        self.files.get(name)
    }
}

/// Collect all multipart fields. A request that is not multipart at all
/// yields an empty form so handlers report their usual "required" errors.
async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> Result<Form, ApiError> {
    let mut form = Form::default();
    let Ok(mut multipart) = multipart else {
        return Ok(form);
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        // Only a file name marks an upload; text parts may carry a content type.
        let is_file = field.file_name().is_some();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(upload_error)?;

        if is_file {
            if !bytes.is_empty() {
                form.files.insert(name, Upload { bytes, content_type });
            }
        } else {
            form.texts
                .insert(name, String::from_utf8_lossy(&bytes).into_owned());
        }
    }

    Ok(form)
}

fn upload_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::too_large("Upload too large")
    } else {
        ApiError::bad_request(format!("Malformed upload: {err}"))
    }
}

fn jpeg_data_uri(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

/// Run CPU-bound image work off the async workers. Decode failures become
/// 400s; anything else is reported under `public`.
async fn blocking<T, F>(public: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PreprocessError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(err @ (PreprocessError::Decode(_) | PreprocessError::Empty))) => {
            tracing::debug!(error = %err, "rejecting upload");
            Err(ApiError::bad_request("Could not decode image"))
        }
        Ok(Err(err)) => Err(ApiError::internal(public, err)),
        Err(join) => Err(ApiError::internal(public, join)),
    }
}

/// Call the model, treating a reply without text (e.g. a safety block) as
/// an empty answer.
async fn generate_or_empty(ai: &GeminiClient, parts: &[Part]) -> Result<String, AiError> {
    match ai.generate(parts).await {
        Err(AiError::EmptyReply) => {
            tracing::warn!("model returned no text; continuing with an empty reply");
            Ok(String::new())
        }
        other => other,
    }
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Stats>, ApiError> {
    let stats = state
        .store
        .stats()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch stats", e))?;
    Ok(Json(stats))
}

async fn list_faces(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FaceWithUser>>, ApiError> {
    let faces = state
        .store
        .all_faces()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch faces", e))?;
    Ok(Json(faces))
}

async fn list_summaries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SummaryRecord>>, ApiError> {
    let summaries = state
        .store
        .all_summaries()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch summaries", e))?;
    Ok(Json(summaries))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub name: String,
    pub preview_image: String,
}

async fn register_face(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    const FAILED: &str = "Failed to register face";

    let form = read_form(multipart).await?;
    let (Some(name), Some(image)) = (form.text("name"), form.file("image")) else {
        return Err(ApiError::bad_request("Name and image are required"));
    };

    let bytes = image.bytes.clone();
    let size = state.scoring.image_size as u32;
    let prepared =
        blocking(FAILED, move || preprocess::prepare_registration(&bytes, size)).await?;

    let user = state
        .store
        .get_or_create_user(name)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;

    let files = state
        .dataset
        .write_face(user.id, &prepared.preview, &prepared.vector)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;

    let face = state
        .store
        .create_face(NewFace {
            user_id: user.id,
            face_path: Some(files.face_file),
            vector_path: Some(files.vector_file),
        })
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;

    tracing::info!(user_id = user.id, face_id = face.id, name, "face registered");

    Ok(Json(RegisterResponse {
        success: true,
        name: name.to_string(),
        preview_image: jpeg_data_uri(&prepared.preview),
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestMatch {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub name: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub match_found: bool,
    pub best_match: Option<BestMatch>,
    pub all_matches: Vec<MatchEntry>,
    pub annotated_image: String,
}

/// A registered face loaded for comparison.
struct Candidate {
    name: String,
    jpeg: Vec<u8>,
}

/// Confidence for one registered face, pointing back at its candidate.
#[derive(Debug, Clone, PartialEq)]
struct Ranked {
    index: usize,
    confidence: f64,
}

/// Attach model scores to candidates by name and sort best-first.
///
/// Scores are clamped to [0, 100] and rounded to 2 decimals; a name the
/// model left out scores 0.
fn rank_candidates(names: &[&str], scores: &[AiScore]) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let raw = scores
                .iter()
                .find(|s| s.name == *name)
                .map(|s| s.score)
                .filter(|s| s.is_finite())
                .unwrap_or(0.0);
            Ranked {
                index,
                confidence: round2(raw.clamp(0.0, 100.0)),
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

async fn recognize_face(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecognizeResponse>, ApiError> {
    const FAILED: &str = "Failed to recognize face";

    let form = read_form(multipart).await?;
    let image = form
        .file("image")
        .ok_or_else(|| ApiError::bad_request("Image is required"))?;

    let faces = state
        .store
        .all_faces()
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;
    if faces.is_empty() {
        return Err(ApiError::bad_request("No faces registered yet"));
    }

    let bytes = image.bytes.clone();
    let query = blocking(FAILED, move || preprocess::prepare_query(&bytes)).await?;

    let mut candidates = Vec::with_capacity(faces.len());
    for row in &faces {
        let Some(path) = row.face.face_path.as_deref() else {
            continue;
        };
        match state.dataset.read_face(path).await {
            Ok(jpeg) => candidates.push(Candidate {
                name: row.user.name.clone(),
                jpeg,
            }),
            Err(err) => {
                tracing::warn!(face_id = row.face.id, error = %err, "skipping unreadable face image");
            }
        }
    }
    if candidates.is_empty() {
        return Err(ApiError::bad_request("No face images available for comparison"));
    }

    let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
    let mut parts = Vec::with_capacity(3 + 2 * candidates.len());
    parts.push(Part::text(prompts::recognition_prompt(&names)));
    parts.push(Part::inline("image/jpeg", &query.query));
    parts.push(Part::text(prompts::REGISTERED_FACES_HEADER));
    for (i, candidate) in candidates.iter().enumerate() {
        parts.push(Part::text(prompts::registered_face_label(i, &candidate.name)));
        parts.push(Part::inline("image/jpeg", &candidate.jpeg));
    }

    let reply = generate_or_empty(&state.ai, &parts)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;
    let scores = prompts::parse_scores(&reply);
    let ranked = rank_candidates(&names, &scores);

    let best = ranked.first().filter(|r| r.confidence >= state.match_threshold);
    tracing::info!(
        candidates = candidates.len(),
        scored = scores.len(),
        best = ranked.first().map(|r| r.confidence),
        matched = best.is_some(),
        "recognition finished"
    );

    let (best_match, all_matches) = match best {
        Some(top) => (
            Some(BestMatch {
                name: candidates[top.index].name.clone(),
                confidence: top.confidence,
            }),
            ranked
                .iter()
                .map(|r| MatchEntry {
                    name: candidates[r.index].name.clone(),
                    confidence: r.confidence,
                    face_image: Some(jpeg_data_uri(&candidates[r.index].jpeg)),
                })
                .collect(),
        ),
        None => (None, Vec::new()),
    };

    Ok(Json(RecognizeResponse {
        match_found: best_match.is_some(),
        best_match,
        all_matches,
        annotated_image: jpeg_data_uri(&query.thumbnail),
    }))
}

async fn analyze_face(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FaceAnalysis>, ApiError> {
    const FAILED: &str = "Face analysis failed";

    let form = read_form(multipart).await?;
    let image = form
        .file("image")
        .ok_or_else(|| ApiError::bad_request("Image is required"))?;
    let mime = image
        .content_type
        .clone()
        .filter(|m| m.starts_with("image/"))
        .unwrap_or_else(|| "image/jpeg".to_string());

    let parts = [
        Part::inline(mime, &image.bytes),
        Part::text(prompts::ANALYSIS_PROMPT),
    ];
    let reply = state
        .ai
        .generate(&parts)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;
    let analysis = prompts::parse_analysis(&reply).map_err(|e| ApiError::internal(FAILED, e))?;

    tracing::info!(
        age = analysis.age,
        emotion = %analysis.emotion,
        "face analyzed"
    );
    Ok(Json(analysis))
}

fn default_style() -> String {
    "concise".to_string()
}

fn default_max_length() -> u32 {
    150
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
    pub word_count: usize,
    pub style: String,
    pub created_at: String,
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    const FAILED: &str = "Summarization failed";

    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("Text is required"));
    }

    let prompt = prompts::summary_prompt(&req.text, &req.style, req.max_length);
    let summary = generate_or_empty(&state.ai, &[Part::text(prompt)])
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;
    let word_count = prompts::word_count(&summary);

    state
        .store
        .create_summary(NewSummary {
            original_text: req.text,
            summary: summary.clone(),
            model_used: state.ai.model().to_string(),
            summary_style: req.style.clone(),
            word_count: word_count as i64,
        })
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;

    tracing::info!(style = %req.style, word_count, "summary stored");

    Ok(Json(SummarizeResponse {
        summary,
        word_count,
        style: req.style,
        created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompareResponse {
    pub score: f64,
    pub pixel_cosine: f64,
    pub gradient_cosine: f64,
    pub block_similarity: f64,
}

/// Score two uploads with the local similarity pipeline. Purely
/// informational: recognition never consults it.
async fn compare_faces(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CompareResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let (Some(a), Some(b)) = (form.file("image_a"), form.file("image_b")) else {
        return Err(ApiError::bad_request("Two images are required"));
    };

    let (a, b) = (a.bytes.clone(), b.bytes.clone());
    let scoring = state.scoring.clone();
    let size = scoring.image_size as u32;
    let breakdown = blocking("Comparison failed", move || {
        let va = preprocess::pixel_vector_from_bytes(&a, size)?;
        let vb = preprocess::pixel_vector_from_bytes(&b, size)?;
        Ok(facekit_core::score_breakdown(&va, &vb, &scoring))
    })
    .await?
    .map_err(|e| ApiError::internal("Comparison failed", e))?;

    Ok(Json(CompareResponse {
        score: breakdown.score.value(),
        pixel_cosine: breakdown.pixel_cosine,
        gradient_cosine: breakdown.gradient_cosine,
        block_similarity: breakdown.block_similarity,
    }))
}
