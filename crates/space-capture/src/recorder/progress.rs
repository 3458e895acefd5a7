//! Parsing of ffmpeg's periodic status line.
//!
//! Audio-only stream copies print e.g.
//! `size=     256KiB time=00:00:16.04 bitrate= 130.7kbits/s speed=32.1x`.

/// Values carried by one ffmpeg status line. Fields ffmpeg reports as `N/A`
/// are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TranscodeProgress {
    /// Bytes written so far.
    pub size_bytes: Option<u64>,
    /// Media time written so far, in seconds.
    pub media_secs: Option<f64>,
    /// Output bitrate in kbit/s.
    pub bitrate_kbps: Option<f64>,
    /// Processing speed relative to real time.
    pub speed: Option<f64>,
}

impl TranscodeProgress {
    /// Parse a status record; `None` for any other stderr output.
    pub fn parse(record: &str) -> Option<Self> {
        // `time=` alone also shows up in unrelated messages.
        if !record.contains("time=") || !(record.contains("size=") || record.contains("frame=")) {
            return None;
        }

        Some(Self {
            size_bytes: field(record, "size=").and_then(parse_size),
            media_secs: field(record, "time=").and_then(parse_clock),
            bitrate_kbps: field(record, "bitrate=")
                .and_then(|v| v.strip_suffix("kbits/s"))
                .and_then(|v| v.parse().ok()),
            speed: field(record, "speed=")
                .and_then(|v| v.strip_suffix('x'))
                .and_then(|v| v.trim().parse().ok()),
        })
    }
}

/// Value following `key`, with ffmpeg's alignment padding skipped.
fn field<'a>(record: &'a str, key: &str) -> Option<&'a str> {
    let start = record.find(key)? + key.len();
    let rest = record[start..].trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let value = &rest[..end];
    (!value.is_empty()).then_some(value)
}

const SIZE_UNITS: [(&str, u64); 5] = [
    ("KiB", 1024),
    ("kB", 1024),
    ("KB", 1024),
    ("MiB", 1024 * 1024),
    ("B", 1),
];

fn parse_size(value: &str) -> Option<u64> {
    let (number, multiplier) = SIZE_UNITS
        .iter()
        .find_map(|&(suffix, mult)| value.strip_suffix(suffix).map(|n| (n, mult)))?;
    number.parse::<u64>().ok()?.checked_mul(multiplier)
}

/// `HH:MM:SS.ms` to seconds.
fn parse_clock(value: &str) -> Option<f64> {
    if value.starts_with('-') {
        return None;
    }
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
