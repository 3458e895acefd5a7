mod cli;
mod config;
mod error;
mod logging;
mod params;

use std::process;
use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use space_capture::{
    CaptureConfig, DownloadJob, FfmpegRecorder, JobRequest, Pipeline, default_base_name,
    download_with_retries,
};
use tracing::{error, info};

use crate::cli::{Args, Commands};
use crate::error::{AppError, Result};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let guard = match logging::init_logging(args.verbose, args.quiet, args.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Application error: {e}");
            eprintln!("Error: {e}");
            1
        }
    };

    // Flush the file writer before leaving.
    drop(guard);
    process::exit(code);
}

async fn run(args: Args) -> Result<()> {
    let config = config::load(&args)?;

    match args.command {
        Commands::Download {
            url,
            name,
            sub_dir,
            metadata,
            resolver,
            retries,
        } => {
            let config = match resolver {
                Some(resolver) => config.with_resolver(resolver),
                None => config,
            };
            let metadata = params::parse_metadata(&metadata)?;
            let base_name = name.unwrap_or_else(default_base_name);

            let mut request = JobRequest::new(url, base_name).with_metadata(metadata);
            if let Some(sub_dir) = sub_dir {
                request = request.with_sub_dir(sub_dir);
            }

            let pipeline = Arc::new(Pipeline::from_config(&config)?);
            let mut job = DownloadJob::new(request, pipeline)?;
            let audio = download_with_retries(&mut job, retries).await?;

            info!(path = %audio.display(), "Recording finished");
            println!("{}", audio.display());
        }
        Commands::Check => check(&config)?,
    }

    Ok(())
}

fn check(config: &CaptureConfig) -> Result<()> {
    let recorder = FfmpegRecorder::new(config.ffmpeg_path.clone());
    let version = recorder
        .detect_version()
        .ok_or_else(|| AppError::FfmpegUnavailable(config.ffmpeg_path.clone()))?;

    println!("{version}");
    println!("media directory: {}", config.media_dir.display());
    println!("resolver: {:?}", config.resolver);
    Ok(())
}
