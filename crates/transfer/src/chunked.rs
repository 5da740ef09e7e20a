use std::io::{Cursor, Read, Seek, SeekFrom};

use tracing::{debug, info, warn};

use crate::progress::{ProgressCallback, SpeedCalculator, TransferProgress};
use crate::retry::RetryPolicy;
use crate::transport::{PutRequest, PutResponse, RangeTransport};
use crate::types::{Chunk, TransferMode, UploadReport, UploadSession};
use crate::{CSV_CONTENT_TYPE, DEFAULT_CHUNK_SIZE, PayloadBuffer, TransferError};

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a payload in fixed-size chunks.
pub struct ChunkReader<'a> {
    cursor: Cursor<&'a [u8]>,
    chunk_size: usize,
    offset: u64,
    total_size: u64,
}

impl<'a> ChunkReader<'a> {
    /// Starts reading `payload` from its first byte.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(payload: &'a PayloadBuffer, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            cursor: payload.reader(),
            chunk_size,
            offset: 0,
            total_size: payload.len(),
        }
    }

    /// Moves the read cursor to `offset`.
    pub fn seek_to(&mut self, offset: u64) -> Result<(), TransferError> {
        self.cursor.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }

    /// Reads the next chunk. Returns `None` once the payload is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; read_size];
        let n = self.cursor.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);

        let chunk = Chunk {
            offset: self.offset,
            data: buf,
        };
        self.offset += n as u64;
        Ok(Some(chunk))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.offset)
    }
}

/// Formats a `Content-Range` value for the inclusive range `start..=end`.
pub fn content_range(start_byte: u64, end_byte: u64, total_size: u64) -> String {
    format!("bytes {start_byte}-{end_byte}/{total_size}")
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// Sends one PUT, retrying transient network failures per `retry`.
async fn put_with_retry(
    transport: &dyn RangeTransport,
    retry: &RetryPolicy,
    request: PutRequest<'_>,
) -> Result<PutResponse, TransferError> {
    let mut attempt = 1;
    loop {
        match transport.put(request).await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_transient() && retry.should_retry(attempt) => {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    attempt,
                    max_attempts = retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    range = request.content_range.unwrap_or("-"),
                    error = %e,
                    "PUT failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(TransferError::Transport {
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}

/// Uploads the whole payload with one PUT and no `Content-Range`.
pub async fn upload_single(
    transport: &dyn RangeTransport,
    retry: &RetryPolicy,
    payload: &PayloadBuffer,
    url: &str,
) -> Result<UploadReport, TransferError> {
    let mut session = UploadSession::new(payload.len());
    debug!(bytes = payload.len(), "sending payload in one request");

    let resp = put_with_retry(
        transport,
        retry,
        PutRequest {
            url,
            content_range: None,
            content_type: CSV_CONTENT_TYPE,
            body: payload.as_bytes(),
        },
    )
    .await?;

    if !(200..300).contains(&resp.status) {
        return Err(TransferError::UploadRejected {
            status: resp.status,
            body: resp.body,
        });
    }

    if !payload.is_empty() {
        session.acknowledge(payload.len() - 1);
    }
    info!(bytes = payload.len(), status = resp.status, "upload complete");
    Ok(session.report(TransferMode::SingleShot))
}

/// Drives the resumable upload protocol.
///
/// Every chunk is PUT with `Content-Range: bytes {start}-{end}/{total}`.
/// 308 means "received, send the next range"; 200 or 201 means the object is
/// complete. Any other status aborts the transfer without retrying the chunk.
pub struct ChunkedUploader<'a> {
    transport: &'a dyn RangeTransport,
    retry: RetryPolicy,
    on_progress: Option<ProgressCallback>,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(transport: &'a dyn RangeTransport) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            on_progress: None,
        }
    }

    /// Replaces the retry policy for transient network failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a callback invoked after each acknowledged chunk.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Transfers `payload` to `url` in chunks of `chunk_size` bytes.
    ///
    /// `total_size` must equal the payload's byte length; a mismatch is
    /// rejected before anything is sent. If every chunk is answered with 308,
    /// the upload ends once the payload is exhausted.
    pub async fn upload(
        &self,
        payload: &PayloadBuffer,
        total_size: u64,
        url: &str,
        chunk_size: usize,
    ) -> Result<UploadReport, TransferError> {
        if total_size != payload.len() {
            return Err(TransferError::SizeMismatch {
                declared: total_size,
                actual: payload.len(),
            });
        }

        let mut reader = ChunkReader::new(payload, chunk_size);
        reader.seek_to(0)?;
        let mut session = UploadSession::new(total_size);
        let speed = SpeedCalculator::new(None, None);
        speed.add_sample(0);

        info!(
            total_bytes = total_size,
            chunk_size = reader.chunk_size(),
            "starting resumable upload"
        );

        loop {
            let Some(chunk) = reader.next_chunk()? else {
                warn!(
                    sent = session.start_byte(),
                    total = total_size,
                    "payload exhausted before the server confirmed completion"
                );
                return Ok(session.report(TransferMode::Resumable));
            };
            debug_assert_eq!(chunk.offset, session.start_byte());

            let start_byte = session.start_byte();
            let end_byte = chunk.end_byte();
            let range = content_range(start_byte, end_byte, total_size);
            debug!(range = %range, bytes = chunk.len(), "sending chunk");

            let resp = put_with_retry(
                self.transport,
                &self.retry,
                PutRequest {
                    url,
                    content_range: Some(&range),
                    content_type: CSV_CONTENT_TYPE,
                    body: &chunk.data,
                },
            )
            .await?;

            match resp.status {
                200 | 201 => {
                    session.acknowledge(end_byte);
                    self.emit_progress(&session, &speed, chunk.len());
                    info!(
                        bytes = total_size,
                        chunks = session.chunks_sent(),
                        status = resp.status,
                        "upload complete"
                    );
                    return Ok(session.report(TransferMode::Resumable));
                }
                308 => {
                    session.acknowledge(end_byte);
                    self.emit_progress(&session, &speed, chunk.len());
                    debug!(
                        start_byte,
                        end_byte,
                        next = session.start_byte(),
                        "chunk accepted"
                    );
                }
                status => {
                    warn!(status, range = %range, "chunk rejected");
                    return Err(TransferError::ChunkUpload {
                        status,
                        body: resp.body,
                    });
                }
            }
        }
    }

    fn emit_progress(&self, session: &UploadSession, speed: &SpeedCalculator, bytes: usize) {
        speed.add_sample(bytes as u64);
        if let Some(cb) = &self.on_progress {
            cb(TransferProgress {
                acknowledged_bytes: session.start_byte(),
                total_bytes: session.total_size(),
                chunks_sent: session.chunks_sent(),
                bytes_per_second: speed.bytes_per_second(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportErrorKind};
    use crate::{Record, encode_records};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A PUT as seen by the mock.
    #[derive(Debug, Clone)]
    struct SentPut {
        content_range: Option<String>,
        content_type: String,
        body: Vec<u8>,
    }

    /// Replays scripted outcomes and records every request.
    struct MockTransport {
        outcomes: Mutex<Vec<Result<PutResponse, TransportError>>>,
        sent: Mutex<Vec<SentPut>>,
    }

    impl MockTransport {
        fn new(outcomes: Vec<Result<PutResponse, TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn statuses(statuses: &[u16]) -> Self {
            Self::new(
                statuses
                    .iter()
                    .map(|&status| {
                        Ok(PutResponse {
                            status,
                            body: String::new(),
                        })
                    })
                    .collect(),
            )
        }

        /// Answers 308 to every PUT.
        fn always_incomplete(count: usize) -> Self {
            Self::statuses(&vec![308; count])
        }

        fn sent(&self) -> Vec<SentPut> {
            self.sent.lock().unwrap().clone()
        }

        fn ranges(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .map(|p| p.content_range.unwrap_or_default())
                .collect()
        }
    }

    impl RangeTransport for MockTransport {
        fn put<'a>(
            &'a self,
            request: PutRequest<'a>,
        ) -> Pin<Box<dyn Future<Output = Result<PutResponse, TransportError>> + Send + 'a>>
        {
            self.sent.lock().unwrap().push(SentPut {
                content_range: request.content_range.map(str::to_string),
                content_type: request.content_type.to_string(),
                body: request.body.to_vec(),
            });
            Box::pin(async move {
                let mut outcomes = self.outcomes.lock().unwrap();
                if outcomes.is_empty() {
                    Err(TransportError::new(
                        TransportErrorKind::Other,
                        "no scripted response",
                    ))
                } else {
                    outcomes.remove(0)
                }
            })
        }
    }

    /// Builds a payload of exactly `size` bytes.
    fn payload_of_size(size: usize) -> PayloadBuffer {
        // Header "v\r\n" is 3 bytes; the single row carries the rest.
        assert!(size >= 6);
        let value = "x".repeat(size - 5);
        let payload = encode_records(&[Record::new().with("v", value)]).unwrap();
        assert_eq!(payload.len(), size as u64);
        payload
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn content_range_format() {
        assert_eq!(content_range(0, 99, 238), "bytes 0-99/238");
    }

    #[test]
    fn chunk_reader_reads_all() {
        let payload = payload_of_size(10);
        let mut reader = ChunkReader::new(&payload, 4);
        assert_eq!(reader.remaining(), 10);

        let c1 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c1.offset, c1.len()), (0, 4));
        let c2 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c2.offset, c2.len()), (4, 4));
        let c3 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c3.offset, c3.len()), (8, 2));
        assert!(reader.next_chunk().unwrap().is_none());

        let joined: Vec<u8> = [c1.data, c2.data, c3.data].concat();
        assert_eq!(joined, payload.as_bytes());
    }

    #[test]
    fn chunk_reader_seek() {
        let payload = payload_of_size(10);
        let mut reader = ChunkReader::new(&payload, 4);
        reader.seek_to(6).unwrap();
        assert_eq!(reader.offset(), 6);
        let c = reader.next_chunk().unwrap().unwrap();
        assert_eq!(c.offset, 6);
        assert_eq!(c.data, &payload.as_bytes()[6..]);
    }

    #[test]
    fn chunk_reader_zero_uses_default() {
        let payload = payload_of_size(10);
        let reader = ChunkReader::new(&payload, 0);
        assert_eq!(reader.chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn three_chunks_with_final_short_chunk() {
        let payload = payload_of_size(238);
        let mock = MockTransport::statuses(&[308, 308, 200]);

        let report = ChunkedUploader::new(&mock)
            .upload(&payload, 238, "https://upload.example/obj", 100)
            .await
            .unwrap();

        assert_eq!(
            mock.ranges(),
            vec!["bytes 0-99/238", "bytes 100-199/238", "bytes 200-237/238"]
        );
        assert_eq!(report.mode, TransferMode::Resumable);
        assert_eq!(report.chunks_sent, 3);
        assert_eq!(report.bytes_sent, 238);

        let sent = mock.sent();
        assert!(sent.iter().all(|p| p.content_type == "text/csv"));
        let body: Vec<u8> = sent.into_iter().flat_map(|p| p.body).collect();
        assert_eq!(body, payload.as_bytes());
    }

    #[tokio::test]
    async fn created_status_also_completes() {
        let payload = payload_of_size(50);
        let mock = MockTransport::statuses(&[308, 201]);

        let report = ChunkedUploader::new(&mock)
            .upload(&payload, 50, "u", 25)
            .await
            .unwrap();
        assert_eq!(report.chunks_sent, 2);
    }

    #[tokio::test]
    async fn chunk_count_and_contiguity() {
        for (size, chunk_size) in [(1000usize, 256usize), (1024, 256), (7, 3), (300, 1000)] {
            let payload = payload_of_size(size);
            let chunks = size.div_ceil(chunk_size);
            let mut statuses = vec![308; chunks - 1];
            statuses.push(200);
            let mock = MockTransport::statuses(&statuses);

            ChunkedUploader::new(&mock)
                .upload(&payload, size as u64, "u", chunk_size)
                .await
                .unwrap();

            let sent = mock.sent();
            assert_eq!(sent.len(), chunks);

            let mut expected_start = 0u64;
            for put in &sent {
                let range = put.content_range.as_deref().unwrap();
                let bytes = range.strip_prefix("bytes ").unwrap();
                let (span, total) = bytes.split_once('/').unwrap();
                let (start, end) = span.split_once('-').unwrap();
                let (start, end): (u64, u64) = (start.parse().unwrap(), end.parse().unwrap());
                assert_eq!(start, expected_start);
                assert_eq!(end - start + 1, put.body.len() as u64);
                assert_eq!(total, size.to_string());
                expected_start = end + 1;
            }
            assert_eq!(expected_start, size as u64);
        }
    }

    #[tokio::test]
    async fn error_status_aborts_immediately() {
        let payload = payload_of_size(238);
        let mock = MockTransport::new(vec![
            Ok(PutResponse {
                status: 400,
                body: "Invalid request. Content-Range mismatch".into(),
            }),
            Ok(PutResponse {
                status: 200,
                body: String::new(),
            }),
        ]);

        let err = ChunkedUploader::new(&mock)
            .upload(&payload, 238, "u", 100)
            .await
            .unwrap_err();

        match err {
            TransferError::ChunkUpload { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Content-Range mismatch"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.sent().len(), 1);
    }

    #[tokio::test]
    async fn error_mid_stream_stops_after_failing_chunk() {
        let payload = payload_of_size(238);
        let mock = MockTransport::statuses(&[308, 503, 308]);

        let err = ChunkedUploader::new(&mock)
            .with_retry(fast_retry())
            .upload(&payload, 238, "u", 100)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::ChunkUpload { status: 503, .. }));
        assert_eq!(mock.ranges(), vec!["bytes 0-99/238", "bytes 100-199/238"]);
    }

    #[tokio::test]
    async fn transient_failure_retries_same_range() {
        let payload = payload_of_size(238);
        let mock = MockTransport::new(vec![
            Ok(PutResponse {
                status: 308,
                body: String::new(),
            }),
            Err(TransportError::new(
                TransportErrorKind::Connect,
                "connection reset",
            )),
            Err(TransportError::new(TransportErrorKind::Timeout, "timed out")),
            Ok(PutResponse {
                status: 308,
                body: String::new(),
            }),
            Ok(PutResponse {
                status: 200,
                body: String::new(),
            }),
        ]);

        let report = ChunkedUploader::new(&mock)
            .with_retry(fast_retry())
            .upload(&payload, 238, "u", 100)
            .await
            .unwrap();

        assert_eq!(report.chunks_sent, 3);
        assert_eq!(
            mock.ranges(),
            vec![
                "bytes 0-99/238",
                "bytes 100-199/238",
                "bytes 100-199/238",
                "bytes 100-199/238",
                "bytes 200-237/238",
            ]
        );
    }

    #[tokio::test]
    async fn transient_failures_exhaust_budget() {
        let payload = payload_of_size(50);
        let mock = MockTransport::new(
            (0..5)
                .map(|_| Err(TransportError::new(TransportErrorKind::Connect, "refused")))
                .collect(),
        );

        let err = ChunkedUploader::new(&mock)
            .with_retry(fast_retry())
            .upload(&payload, 50, "u", 100)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Transport { attempts: 3, .. }));
        assert_eq!(mock.sent().len(), 3);
    }

    #[tokio::test]
    async fn non_transient_transport_error_is_not_retried() {
        let payload = payload_of_size(50);
        let mock = MockTransport::new(vec![Err(TransportError::new(
            TransportErrorKind::Other,
            "invalid url",
        ))]);

        let err = ChunkedUploader::new(&mock)
            .with_retry(fast_retry())
            .upload(&payload, 50, "u", 100)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Transport { attempts: 1, .. }));
        assert_eq!(mock.sent().len(), 1);
    }

    #[tokio::test]
    async fn declared_size_mismatch_sends_nothing() {
        let payload = payload_of_size(238);
        let mock = MockTransport::always_incomplete(3);

        let err = ChunkedUploader::new(&mock)
            .upload(&payload, 240, "u", 100)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::SizeMismatch {
                declared: 240,
                actual: 238
            }
        ));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn exhausted_payload_ends_upload_without_completion_status() {
        let payload = payload_of_size(238);
        let mock = MockTransport::always_incomplete(5);

        let report = ChunkedUploader::new(&mock)
            .upload(&payload, 238, "u", 100)
            .await
            .unwrap();

        assert_eq!(mock.sent().len(), 3);
        assert_eq!(report.mode, TransferMode::Resumable);
        assert_eq!(report.chunks_sent, 3);
        assert_eq!(report.bytes_sent, 238);
    }

    #[tokio::test]
    async fn negative_backoff_factor_still_exhausts_budget() {
        let payload = payload_of_size(50);
        let mock = MockTransport::new(
            (0..5)
                .map(|_| Err(TransportError::new(TransportErrorKind::Connect, "refused")))
                .collect(),
        );
        let retry = RetryPolicy {
            backoff_factor: -2.0,
            ..fast_retry()
        };

        let err = ChunkedUploader::new(&mock)
            .with_retry(retry)
            .upload(&payload, 50, "u", 100)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Transport { attempts: 3, .. }));
        assert_eq!(mock.sent().len(), 3);
    }

    #[tokio::test]
    async fn progress_reported_per_chunk() {
        let payload = payload_of_size(238);
        let mock = MockTransport::statuses(&[308, 308, 200]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);

        ChunkedUploader::new(&mock)
            .on_progress(Box::new(move |p| {
                s.lock().unwrap().push(p.acknowledged_bytes);
            }))
            .upload(&payload, 238, "u", 100)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![100, 200, 238]);
    }

    #[tokio::test]
    async fn single_shot_sends_whole_payload() {
        let payload = payload_of_size(120);
        let mock = MockTransport::statuses(&[200]);

        let report = upload_single(&mock, &RetryPolicy::none(), &payload, "u")
            .await
            .unwrap();

        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content_range.is_none());
        assert_eq!(sent[0].body, payload.as_bytes());
        assert_eq!(report.mode, TransferMode::SingleShot);
        assert_eq!(report.bytes_sent, 120);
        assert_eq!(report.chunks_sent, 1);
    }

    #[tokio::test]
    async fn single_shot_rejection_carries_body() {
        let payload = payload_of_size(20);
        let mock = MockTransport::new(vec![Ok(PutResponse {
            status: 403,
            body: "expired".into(),
        })]);

        let err = upload_single(&mock, &RetryPolicy::none(), &payload, "u")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::UploadRejected { status: 403, ref body } if body == "expired"
        ));
    }
}
