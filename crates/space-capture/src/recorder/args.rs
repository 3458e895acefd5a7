//! ffmpeg argument construction for the stream-copy recording.

use std::ffi::OsString;
use std::path::Path;

use crate::metadata::MetadataTags;

/// Protocols ffmpeg may open while reading the rewritten manifest.
///
/// The manifest comes from the network; anything outside this list (e.g.
/// `concat:`, `subfile:`, plain `http`) is refused by ffmpeg.
pub const PROTOCOL_WHITELIST: &str = "file,https,tls,tcp";

/// Build the full ffmpeg argument list.
///
/// Order: protocol allow-list, input, stream copy, metadata, operator
/// arguments, output path. Operator arguments come after the built-in ones so
/// they can override them; the output path is always last.
pub fn build_transcode_args(
    manifest_path: &Path,
    audio_path: &Path,
    metadata: &MetadataTags,
    extra_args: &[String],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-protocol_whitelist".into(),
        PROTOCOL_WHITELIST.into(),
        "-i".into(),
        manifest_path.as_os_str().to_os_string(),
        "-c".into(),
        "copy".into(),
    ];

    for (key, value) in metadata.effective() {
        args.push("-metadata".into());
        args.push(format!("{key}={value}").into());
    }

    args.extend(extra_args.iter().map(OsString::from));
    args.push(audio_path.as_os_str().to_os_string());
    args
}

/// Render arguments for logging.
pub fn display_args(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}
