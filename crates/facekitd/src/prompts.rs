//! Prompt text and parsing of model replies.

use serde::{Deserialize, Serialize};

/// Instructions for comparing a query face against registered faces.
/// `names` are listed in the order the images are attached.
pub fn recognition_prompt(names: &[&str]) -> String {
    let roster = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("Person {}: \"{}\"", i + 1, name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a strict face recognition system. Compare the QUERY face photo against {count} registered face photos and determine if ANY of them are the SAME PERSON as the query.

IMPORTANT: Be very strict. Only give high scores when you are genuinely confident the faces belong to the same person. Most comparisons between different people should score BELOW 25.

For each registered person, give a similarity score from 0 to 100:
- 80-100: Clearly the same person (matching facial structure, bone structure, distinctive features)
- 50-79: Possibly the same person (several key features match closely)
- 25-49: Some superficial similarity but likely different people
- 0-24: Different person (this should be the most common score for genuinely different people)

Focus on: face shape, eye spacing and shape, nose shape and size, jawline, forehead shape, cheekbone structure, mouth shape, ear shape, distinctive facial features. Ignore: lighting, angle, expression, glasses, hair style, makeup, image quality, clothing.

CRITICAL: If the query face does not match anyone, ALL scores should be below 25. Do NOT inflate scores. Two different people should score low even if they share the same gender, age range, or ethnicity.

Registered people:
{roster}

Respond ONLY with valid JSON array, no other text:
[{{\"name\": \"exact name\", \"score\": number}}]

QUERY FACE:",
        count = names.len(),
    )
}

/// Label placed before the `index`-th (0-based) registered face image.
pub fn registered_face_label(index: usize, name: &str) -> String {
    format!("\nPerson {} (\"{}\"):", index + 1, name)
}

pub const REGISTERED_FACES_HEADER: &str = "\n\nREGISTERED FACES:";

pub const ANALYSIS_PROMPT: &str = r#"Analyze the face in this image. Return ONLY valid JSON (no markdown, no backticks, no extra text) with exactly these keys:
{
  "age": integer (estimated age),
  "gender": "Male" or "Female",
  "emotion": one of ["Happy","Neutral","Serious","Surprised","Sad"],
  "ethnicity": one of ["Caucasian","Asian","African","Latino","Middle Eastern"],
  "confidence_scores": { "gender_pct": float 0-100, "emotion_pct": float 0-100, "ethnicity_pct": float 0-100 },
  "fun_facts": [3 short, fun, personalized observations about this specific face or person based on what you see in the image - e.g. about their expression, style, features, accessories, or vibe. Each fact should be 1-2 sentences and entertaining.]
}"#;

pub fn summary_prompt(text: &str, style: &str, max_length: u32) -> String {
    format!(
        "You are a professional text summarization assistant. Return only the summary, no preamble, no explanation.\n\nSummarize the following text in {style} style, maximum {max_length} words:\n\n{text}"
    )
}

/// Per-person score as returned by the recognition prompt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AiScore {
    pub name: String,
    pub score: f64,
}

/// Pull the `[{name, score}]` array out of a reply that may carry prose or
/// code fences around it. Returns no scores when nothing parses.
pub fn parse_scores(reply: &str) -> Vec<AiScore> {
    let span = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            tracing::warn!(reply = %reply, "no JSON array in recognition reply");
            return Vec::new();
        }
    };
    match serde_json::from_str(span) {
        Ok(scores) => scores,
        Err(err) => {
            tracing::warn!(error = %err, reply = %reply, "failed to parse recognition scores");
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScores {
    pub gender_pct: f64,
    pub emotion_pct: f64,
    pub ethnicity_pct: f64,
}

/// Face attributes estimated by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub age: f64,
    pub gender: String,
    pub emotion: String,
    pub ethnicity: String,
    pub confidence_scores: ConfidenceScores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fun_facts: Option<Vec<String>>,
}

/// Strip markdown fences and parse the analysis JSON.
pub fn parse_analysis(reply: &str) -> Result<FaceAnalysis, serde_json::Error> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim())
}

/// Count non-empty space-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split(' ').filter(|w| !w.is_empty()).count()
}
