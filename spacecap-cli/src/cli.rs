use std::path::PathBuf;

use clap::{Parser, Subcommand};
use space_capture::ResolverKind;

#[derive(Parser, Debug)]
#[command(
    name = "spacecap",
    version,
    about = "Record live HLS audio spaces into a single file with ffmpeg"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root directory for recordings (overrides MEDIA_DIR and the config file)
    #[arg(long, global = true, value_name = "DIR")]
    pub media_dir: Option<PathBuf>,

    /// ffmpeg binary (overrides FFMPEG_PATH and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub ffmpeg_path: Option<String>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging, including ffmpeg's own output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture one live stream
    Download {
        /// Origin URL of the stream (master or media playlist)
        url: String,

        /// Base file name without extension (defaults to the local time)
        #[arg(short, long)]
        name: Option<String>,

        /// Directory below the media directory for this recording
        #[arg(short, long)]
        sub_dir: Option<String>,

        /// Metadata tag written into the audio file, as key=value
        #[arg(short, long = "metadata", value_name = "KEY=VALUE")]
        metadata: Vec<String>,

        /// How the origin URL is turned into a manifest URL
        #[arg(long, value_enum)]
        resolver: Option<ResolverKind>,

        /// Total attempts when the manifest goes stale between resolution and fetch
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
        retries: u32,
    },

    /// Check that ffmpeg can be launched and print its version
    Check,
}
