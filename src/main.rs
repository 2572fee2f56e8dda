use std::fs::File;
use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::Parser;
use soraremix::pipeline::{
    self, RemixConfig, DEFAULT_FRAME_COUNT, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL,
    DEFAULT_MODIFICATION,
};
use soraremix::{Container, FfmpegVideo, OpenAiClient, UploadedVideo};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "soraremix")]
#[command(about = "Generate a 9:16 Sora prompt from a reference video using GPT-4o", long_about = None)]
struct Cli {
    /// Reference video (MP4 or MOV)
    input_file: PathBuf,
    #[arg(short = 'k', long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,
    /// How the content of the video should change
    #[arg(short, long, default_value = DEFAULT_MODIFICATION)]
    modification: String,
    #[arg(short = 'n', long, default_value_t = DEFAULT_FRAME_COUNT,
        value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
    frames: usize,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_TOKENS)]
    max_tokens: u32,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let container = Container::from_path(&cli.input_file)?;
    let upload = UploadedVideo::from_reader(File::open(&cli.input_file)?, container)?;

    let config = RemixConfig {
        modification: cli.modification,
        frame_count: cli.frames,
        model: cli.model,
        max_output_tokens: cli.max_tokens,
    };
    let client = OpenAiClient::new(&cli.api_key);

    let generated = pipeline::generate(&config, upload, FfmpegVideo::open, &client).await?;

    eprintln!("Sora 2 prompt (English):");
    println!("{generated}");

    Ok(())
}
