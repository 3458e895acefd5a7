//! Streaming of ffmpeg's stderr into the log.
//!
//! ffmpeg rewrites its status line with bare `\r`, so splitting on `\n` alone
//! would hold progress back until the process exits. Records here end at
//! either delimiter.

use std::io;

use bytes::{Buf, BytesMut};
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, warn};

use super::progress::TranscodeProgress;

/// Longest record emitted before a forced split.
const MAX_RECORD_LEN: usize = 64 * 1024;

/// Splits a byte stream into trimmed, non-empty text records on `\n` or `\r`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticLineCodec;

impl DiagnosticLineCodec {
    fn take_record(buf: &mut BytesMut, len: usize) -> Option<String> {
        let raw = buf.split_to(len);
        let text = String::from_utf8_lossy(&raw);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl Decoder for DiagnosticLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let Some(pos) = buf.iter().position(|b| matches!(b, b'\n' | b'\r')) else {
                let len = buf.len();
                if len >= MAX_RECORD_LEN {
                    return Ok(Self::take_record(buf, len));
                }
                return Ok(None);
            };

            let record = Self::take_record(buf, pos);
            buf.advance(1);
            if record.is_some() {
                return Ok(record);
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(record) = self.decode(buf)? {
            return Ok(Some(record));
        }
        let len = buf.len();
        if len == 0 {
            return Ok(None);
        }
        Ok(Self::take_record(buf, len))
    }
}

/// What was seen on stderr by the time it closed.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSummary {
    pub records: usize,
    pub last_progress: Option<TranscodeProgress>,
}

/// Log every stderr record as it arrives until the stream closes.
pub async fn forward_diagnostics<R>(reader: R, program: &str) -> DiagnosticsSummary
where
    R: AsyncRead + Unpin,
{
    let mut records = FramedRead::new(reader, DiagnosticLineCodec);
    let mut summary = DiagnosticsSummary::default();

    while let Some(item) = records.next().await {
        match item {
            Ok(record) => {
                summary.records += 1;
                if let Some(progress) = TranscodeProgress::parse(&record) {
                    summary.last_progress = Some(progress);
                }
                if record.contains("Error") || record.contains("error") {
                    warn!(target: "space_capture::ffmpeg", "[{program}] {record}");
                } else {
                    debug!(target: "space_capture::ffmpeg", "[{program}] {record}");
                }
            }
            Err(e) => {
                warn!("Failed to read {program} stderr: {e}");
                break;
            }
        }
    }

    summary
}
