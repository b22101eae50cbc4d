use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use skillkit_core::google::auth::{ServiceAccountCredentials, CLOUD_PLATFORM_SCOPE};
use skillkit_core::google::image::{
    first_image, load_image_part, project_from_env, save_image, GenerateRequest, ImageClient,
};

/// Generate images with Gemini.
#[derive(Parser, Debug)]
#[clap(name = "generate-image", version)]
pub struct Cli {
    /// Text description of the image to generate
    pub prompt: String,

    /// Input image path for image-to-image generation
    #[clap(long, short)]
    pub input: Option<PathBuf>,

    /// Output file path (optional)
    #[clap(long, short)]
    pub output: Option<PathBuf>,

    /// Aspect ratio
    #[clap(long, default_value = "16:9")]
    pub aspect_ratio: String,

    /// Image size
    #[clap(long, value_enum, default_value_t = ImageSize::TwoK)]
    pub size: ImageSize,

    /// YAML settings file (model, location, timeouts)
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSize {
    #[value(name = "1K")]
    OneK,
    #[value(name = "2K")]
    TwoK,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let settings = super::load_settings(cli.config.as_deref())?;
    let project = project_from_env()?;
    let credentials = ServiceAccountCredentials::from_env()?;

    // Read the input before spending a token exchange on it.
    let input = cli.input.as_deref().map(load_image_part).transpose()?;
    let request = GenerateRequest::new(&cli.prompt, input, &cli.aspect_ratio, cli.size.as_str());

    let timeout = settings.timeouts.http();
    let token = credentials.token(&[CLOUD_PLATFORM_SCOPE], timeout).await?;
    let client = ImageClient::new(
        token,
        &project,
        &settings.image.location,
        &settings.image.model,
        timeout,
    )?;

    let response = client.generate(&request).await?;
    let image = first_image(&response)?;
    let saved = save_image(&image, cli.output.as_deref())?;
    println!("Image saved to: {}", saved.display());
    Ok(())
}
