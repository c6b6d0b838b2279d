/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Decoding of upstream streaming bodies.
//!
//! Upstreams deliver chunked chat streams in one of two framings, sometimes
//! switching per deployment: one JSON record per LF-delimited line, or
//! SSE-style `data: <json>` lines separated by blank lines, possibly closed by
//! a `data: [DONE]` sentinel. [`FrameDecoder`] is a line-buffered state
//! machine accepting both; [`json_records`] adapts it over an asynchronous
//! byte stream.

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::provider::ProviderError;

/// The literal sentinel closing an SSE-framed stream. Swallowed, never
/// surfaced as a record.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder turning raw upstream bytes into JSON records.
///
/// Feed arbitrary chunk boundaries; records are only emitted once their
/// terminating newline arrives. Once the `[DONE]` sentinel is seen the decoder
/// is finished and ignores further input.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    /// A fresh decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed a chunk of bytes, returning every record it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Value, ProviderError>> {
        if self.finished {
            return vec![];
        }

        self.buf.extend_from_slice(chunk);

        let mut records = vec![];
        while let Some(pos) = self.buf.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();

            match self.decode_line(&line) {
                Some(record) => records.push(record),
                None => {
                    if self.finished {
                        break;
                    }
                }
            }
        }

        records
    }

    /// Flush a trailing record that was not newline-terminated. Call once,
    /// after the byte source is exhausted.
    pub fn finish(&mut self) -> Option<Result<Value, ProviderError>> {
        if self.finished || self.buf.is_empty() {
            return None;
        }

        let line: Vec<u8> = std::mem::take(&mut self.buf);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<Result<Value, ProviderError>> {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim(),
            Err(err) => {
                return Some(Err(ProviderError::Decode(format!(
                    "stream line is not valid UTF-8: {err}"
                ))))
            }
        };

        // Blank separator lines and `:` comment lines carry nothing.
        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        let payload = line
            .strip_prefix("data:")
            .map(|rest| rest.trim())
            .unwrap_or(line);

        if payload == DONE_SENTINEL {
            self.finished = true;
            return None;
        }

        Some(
            serde_json::from_str(payload)
                .map_err(|err| ProviderError::Decode(format!("invalid JSON in stream: {err}"))),
        )
    }
}

/// Adapt a byte stream into a stream of decoded JSON records.
///
/// The result is lazy, single-pass and finite; transport errors surface
/// in-band as [`ProviderError`] items.
pub fn json_records<S, B>(bytes: S) -> impl Stream<Item = Result<Value, ProviderError>> + Send
where
    S: Stream<Item = Result<B, ProviderError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let mut decoder = FrameDecoder::new();

    // A trailing `None` marks the end of the byte source so the decoder can
    // flush an unterminated final record.
    bytes
        .map(Some)
        .chain(futures::stream::once(async { None }))
        .flat_map(move |item| {
            let records = match item {
                Some(Ok(chunk)) => decoder.feed(chunk.as_ref()),
                Some(Err(err)) => vec![Err(err)],
                None => decoder.finish().into_iter().collect(),
            };

            futures::stream::iter(records)
        })
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use serde_json::json;

    use super::*;

    fn values(records: Vec<Result<Value, ProviderError>>) -> Vec<Value> {
        records.into_iter().map(|record| record.unwrap()).collect()
    }

    #[test]
    fn decodes_json_lines() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"{\"a\":1}\n{\"a\":2}\n");
        assert_eq!(values(records), vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn decodes_sse_data_lines() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\n");
        assert_eq!(values(records), vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn swallows_done_sentinel() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(values(records), vec![json!({"a": 1})]);
        assert!(decoder.is_finished());
        assert!(decoder.feed(b"{\"late\":true}\n").is_empty());
    }

    #[test]
    fn bare_done_sentinel_also_terminates() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"{\"a\":1}\n[DONE]\n");
        assert_eq!(values(records), vec![json!({"a": 1})]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b": keep-alive\n\n\ndata: {\"a\":1}\n");
        assert_eq!(values(records), vec![json!({"a": 1})]);
    }

    #[test]
    fn reassembles_records_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"{\"mess").is_empty());
        assert!(decoder.feed(b"age\":\"hi\"").is_empty());
        let records = decoder.feed(b"}\n");
        assert_eq!(values(records), vec![json!({"message": "hi"})]);
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"data: {\"a\":1}\r\n\r\n");
        assert_eq!(values(records), vec![json!({"a": 1})]);
    }

    #[test]
    fn surfaces_invalid_json_as_decode_errors() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"not json\n{\"a\":1}\n");
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Err(ProviderError::Decode(_))));
        assert_eq!(records[1].as_ref().unwrap(), &json!({"a": 1}));
    }

    #[test]
    fn finish_flushes_unterminated_record() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"{\"a\":1}").is_empty());
        let record = decoder.finish().unwrap().unwrap();
        assert_eq!(record, json!({"a": 1}));
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn adapter_round_trips_a_framed_sequence() {
        let chunks: Vec<Result<Vec<u8>, ProviderError>> = vec![
            Ok(b"{\"n\":1}\n{\"n\"".to_vec()),
            Ok(b":2}\ndata: {\"n\":3}\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
        ];

        let records: Vec<_> = json_records(stream::iter(chunks)).collect().await;
        let records: Vec<Value> = records.into_iter().map(|record| record.unwrap()).collect();
        assert_eq!(
            records,
            vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]
        );
    }

    #[tokio::test]
    async fn adapter_forwards_transport_errors_in_band() {
        let chunks: Vec<Result<Vec<u8>, ProviderError>> = vec![
            Ok(b"{\"n\":1}\n".to_vec()),
            Err(ProviderError::Upstream("connection reset".to_string())),
        ];

        let records: Vec<_> = json_records(stream::iter(chunks)).collect().await;
        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert!(matches!(records[1], Err(ProviderError::Upstream(_))));
    }
}
