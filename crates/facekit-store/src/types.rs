use serde::{Deserialize, Serialize};

/// A person who has registered at least one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

/// One registered face: pointers to its preview image and pixel vector
/// inside the dataset directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceRecord {
    pub id: i64,
    pub user_id: i64,
    pub face_path: Option<String>,
    pub vector_path: Option<String>,
    pub created_at: String,
}

/// A face row joined with its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceWithUser {
    #[serde(flatten)]
    pub face: FaceRecord,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct NewFace {
    pub user_id: i64,
    pub face_path: Option<String>,
    pub vector_path: Option<String>,
}

/// A stored summarization request and its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: i64,
    pub original_text: Option<String>,
    pub summary: Option<String>,
    pub model_used: Option<String>,
    pub summary_style: Option<String>,
    pub word_count: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewSummary {
    pub original_text: String,
    pub summary: String,
    pub model_used: String,
    pub summary_style: String,
    pub word_count: i64,
}

/// Row counts shown on the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_faces: u64,
    pub total_summaries: u64,
}
