//! facekit-store — Persistence for registered faces and summaries.
//!
//! SQLite rows for users, face records and summary history, plus the
//! dataset directory holding face previews and pixel vectors.

pub mod dataset;
pub mod db;
pub mod store;
pub mod types;

pub use dataset::{Dataset, FaceFiles};
pub use store::FaceStore;
pub use types::{FaceRecord, FaceWithUser, NewFace, NewSummary, Stats, SummaryRecord, User};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("dataset I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("pixel vector encoding: {0}")]
    Vector(#[from] serde_json::Error),
    #[error("refusing dataset path outside the dataset directory: {0:?}")]
    InvalidPath(String),
}
