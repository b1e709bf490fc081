use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facekit_core::types::IMAGE_SIZE;
use facekit_core::{preprocess, score_breakdown, ScoringConfig};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facekit", about = "facekit face recognition and summarization CLI")]
struct Cli {
    /// Base URL of the facekitd server
    #[arg(long, global = true, env = "FACEKIT_URL", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Print image data URIs in full instead of eliding them
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score two local images with the built-in similarity pipeline
    Compare {
        a: PathBuf,
        b: PathBuf,
        /// Side of the square canvas both images are reduced to
        #[arg(long, default_value_t = IMAGE_SIZE)]
        size: usize,
    },
    /// Register a face under a name
    Register {
        #[arg(short, long)]
        name: String,
        image: PathBuf,
    },
    /// Identify a face against everyone registered
    Recognize { image: PathBuf },
    /// Estimate age, gender, emotion and ethnicity
    Analyze { image: PathBuf },
    /// Summarize text given inline or read from a file
    Summarize {
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long, default_value = "concise")]
        style: String,
        #[arg(long, default_value_t = 150)]
        max_length: u32,
    },
    /// Show face and summary counts
    Stats,
    /// List registered faces
    Faces,
    /// List past summaries
    Summaries,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = Client::new(&cli.server);
    let mut reply = match cli.command {
        Commands::Compare { a, b, size } => return compare(&a, &b, size),
        Commands::Register { name, image } => {
            let form = Form::new().text("name", name).part("image", image_part(&image).await?);
            client.post_form("/api/register-face", form).await?
        }
        Commands::Recognize { image } => {
            let form = Form::new().part("image", image_part(&image).await?);
            client.post_form("/api/recognize-face", form).await?
        }
        Commands::Analyze { image } => {
            let form = Form::new().part("image", image_part(&image).await?);
            client.post_form("/api/analyze-face", form).await?
        }
        Commands::Summarize {
            text,
            file,
            style,
            max_length,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("either TEXT or --file is required"),
            };
            let body = json!({ "text": text, "style": style, "max_length": max_length });
            client.post_json("/api/summarize", &body).await?
        }
        Commands::Stats => client.get("/api/stats").await?,
        Commands::Faces => client.get("/api/faces").await?,
        Commands::Summaries => client.get("/api/summaries").await?,
    };

    if !cli.raw {
        elide_data_uris(&mut reply);
    }
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

fn compare(a: &Path, b: &Path, size: usize) -> Result<()> {
    let config = ScoringConfig {
        image_size: size,
        ..ScoringConfig::default()
    };
    let load = |path: &Path| -> Result<_> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        preprocess::pixel_vector_from_bytes(&bytes, size as u32)
            .with_context(|| format!("preprocessing {}", path.display()))
    };
    let (va, vb) = (load(a)?, load(b)?);
    let breakdown = score_breakdown(&va, &vb, &config)?;

    println!("score:            {}", breakdown.score);
    println!("pixel cosine:     {:.4}", breakdown.pixel_cosine);
    println!("gradient cosine:  {:.4}", breakdown.gradient_cosine);
    println!("block similarity: {:.4}", breakdown.block_similarity);
    Ok(())
}

struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    fn new(server: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, route: &str) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}{route}", self.base))
            .send()
            .await
            .with_context(|| format!("connecting to {}", self.base))?;
        read_reply(resp).await
    }

    async fn post_form(&self, route: &str, form: Form) -> Result<Value> {
        let resp = self
            .http
            .post(format!("{}{route}", self.base))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("connecting to {}", self.base))?;
        read_reply(resp).await
    }

    async fn post_json(&self, route: &str, body: &Value) -> Result<Value> {
        let resp = self
            .http
            .post(format!("{}{route}", self.base))
            .json(body)
            .send()
            .await
            .with_context(|| format!("connecting to {}", self.base))?;
        read_reply(resp).await
    }
}

async fn read_reply(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await.context("reading server reply")?;
    interpret_reply(status, &text)
}

/// Turn a status and raw body into the JSON reply or an error. Error bodies
/// that are not JSON still report the status.
fn interpret_reply(status: reqwest::StatusCode, text: &str) -> Result<Value> {
    let body = serde_json::from_str::<Value>(text);
    if !status.is_success() {
        let msg = body
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
            .unwrap_or_else(|| text.trim().to_string());
        if msg.is_empty() {
            bail!("server returned {status}");
        }
        bail!("server returned {status}: {msg}");
    }
    body.context("decoding server reply")
}

async fn image_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "uploading image");
    Ok(Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for(path))?)
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Replace every `data:` URI string with a short placeholder.
fn elide_data_uris(value: &mut Value) {
    match value {
        Value::String(s) if s.starts_with("data:") => {
            *s = format!("<image, {} chars>", s.len());
        }
        Value::Array(items) => items.iter_mut().for_each(elide_data_uris),
        Value::Object(map) => map.values_mut().for_each(elide_data_uris),
        _ => {}
    }
}
