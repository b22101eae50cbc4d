//! Text-to-image and image-to-image generation through Vertex AI `generateContent`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{api_error, GoogleError};

pub const PROJECT_ENV_VARS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "CLOUDSDK_CORE_PROJECT"];

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// First non-empty project id among [`PROJECT_ENV_VARS`].
pub fn project_from_lookup<F>(lookup: F) -> Result<String, GoogleError>
where
    F: Fn(&str) -> Option<String>,
{
    PROJECT_ENV_VARS
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.is_empty()))
        .ok_or(GoogleError::MissingProject)
}

pub fn project_from_env() -> Result<String, GoogleError> {
    project_from_lookup(|key| std::env::var(key).ok())
}

/// Vertex AI endpoint for a publisher model; `global` has no regional host prefix.
pub fn vertex_url(project: &str, location: &str, model: &str) -> String {
    let host = if location == "global" {
        "https://aiplatform.googleapis.com".to_string()
    } else {
        format!("https://{location}-aiplatform.googleapis.com")
    };
    format!("{host}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOutputOptions {
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
    pub image_output_options: ImageOutputOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_modalities: Vec<String>,
    pub image_config: ImageConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerateRequest {
    /// One user turn: the optional input image, then the prompt.
    pub fn new(prompt: &str, input_image: Option<Part>, aspect_ratio: &str, image_size: &str) -> Self {
        let mut parts: Vec<Part> = input_image.into_iter().collect();
        parts.push(Part::Text {
            text: prompt.to_string(),
        });

        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: 1.0,
                top_p: 0.95,
                max_output_tokens: 8192,
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: aspect_ratio.to_string(),
                    image_size: image_size.to_string(),
                    image_output_options: ImageOutputOptions {
                        mime_type: "image/png".to_string(),
                    },
                },
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "OFF".to_string(),
                })
                .collect(),
        }
    }
}

/// Reads an image as an inline part. Unknown extensions are sent as PNG.
pub fn load_image_part(path: &Path) -> Result<Part, GoogleError> {
    if !path.exists() {
        return Err(GoogleError::ImageNotFound(path.to_path_buf()));
    }
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "image/png".to_string());
    let bytes = std::fs::read(path)?;
    debug!(path = %path.display(), mime_type = %mime_type, size = bytes.len(), "Loaded input image");
    Ok(Part::Inline {
        inline_data: InlineData {
            mime_type,
            data: STANDARD.encode(bytes),
        },
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

/// A decoded generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn extension(&self) -> &'static str {
        extension_for(&self.mime_type)
    }
}

/// Takes the first inline image across all candidates.
pub fn first_image(response: &GenerateResponse) -> Result<GeneratedImage, GoogleError> {
    let candidates = response
        .candidates
        .as_ref()
        .filter(|c| !c.is_empty())
        .ok_or(GoogleError::NoCandidates)?;

    let inline = candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter())
        .find_map(|p| p.inline_data.as_ref())
        .ok_or(GoogleError::NoImage)?;

    Ok(GeneratedImage {
        bytes: STANDARD.decode(&inline.data)?,
        mime_type: inline.mime_type.clone(),
    })
}

pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => ".jpg",
        "image/webp" => ".webp",
        _ => ".png",
    }
}

/// Where to save the image: `output` (given the extension if it has none) or a kept temp file.
pub fn resolve_output(output: Option<&Path>, extension: &str) -> Result<PathBuf, GoogleError> {
    match output {
        Some(path) if path.extension().is_none() => {
            Ok(path.with_extension(extension.trim_start_matches('.')))
        }
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let file = tempfile::Builder::new()
                .prefix("gemini_image_")
                .suffix(extension)
                .tempfile()?;
            let (_, path) = file.keep().map_err(|e| e.error)?;
            Ok(path)
        }
    }
}

/// Writes the image, creating parent directories. Returns the absolute path.
pub fn save_image(image: &GeneratedImage, output: Option<&Path>) -> Result<PathBuf, GoogleError> {
    let path = resolve_output(output, image.extension())?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &image.bytes)?;
    Ok(std::fs::canonicalize(&path)?)
}

pub struct ImageClient {
    http: Client,
    token: String,
    endpoint: String,
}

impl ImageClient {
    pub fn new(
        token: String,
        project: &str,
        location: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GoogleError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token,
            endpoint: vertex_url(project, location, model),
        })
    }

    /// Sends requests to `endpoint` instead of the Vertex AI host.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GoogleError> {
        info!(endpoint = %self.endpoint, "Requesting image generation");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "Received generation response");
        Ok(serde_json::from_str(&body)?)
    }
}
