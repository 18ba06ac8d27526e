mod envelope;
mod error;

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use pdfchunk_core::{
    part_key, ChunkReport, StorageEvent, StorageEventSummary, StorageOutcome, UploadRequest,
    WebRequestEvent,
};
use pdfchunk_extract::TextExtractor;
use pdfchunk_observability::AppMetrics;
use pdfchunk_storage::DocumentStorage;
use pdfchunk_text::normalize_and_chunk;
use tracing::{info, instrument};
use uuid::Uuid;

pub use envelope::{decode_document, parse_invocation, parse_upload, parse_web_body};
pub use error::ProcessError;

/// Extract → normalize → chunk, plus the two invocation paths built on top of it.
#[derive(Clone)]
pub struct DocumentProcessor {
    extractor: Arc<dyn TextExtractor>,
    chunk_size: usize,
    metrics: Arc<AppMetrics>,
}

impl DocumentProcessor {
    pub fn new(extractor: Arc<dyn TextExtractor>, chunk_size: usize, metrics: Arc<AppMetrics>) -> Self {
        Self {
            extractor,
            chunk_size: chunk_size.max(1),
            metrics,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn process_text(&self, raw: &str) -> ChunkReport {
        let (normalized, chunks) = normalize_and_chunk(raw, self.chunk_size);
        let report = ChunkReport::new(chunks, &normalized);
        info!(
            total_characters = report.total_characters,
            num_chunks = report.num_chunks,
            chunk_size = self.chunk_size,
            "chunked document text"
        );
        self.metrics.record_document(report.num_chunks);
        report
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len(), extractor = self.extractor.name()))]
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<ChunkReport, ProcessError> {
        let started = Instant::now();
        let text = self.extractor.extract_text(bytes)?;
        info!(
            extracted_characters = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extracted document text"
        );
        Ok(self.process_text(&text))
    }

    /// Runs extraction on the blocking pool; PDF parsing is CPU-bound.
    pub async fn process_bytes_blocking(&self, bytes: Bytes) -> Result<ChunkReport, ProcessError> {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || processor.process_bytes(&bytes))
            .await
            .map_err(|err| ProcessError::Internal(format!("extraction task failed: {err}")))?
    }

    #[instrument(skip(self, request), fields(filename = %request.filename))]
    pub async fn handle_upload(&self, request: UploadRequest) -> Result<ChunkReport, ProcessError> {
        if request.pdf.trim().is_empty() {
            return Err(ProcessError::validation("No PDF data in request"));
        }

        let bytes = decode_document(&request.pdf)?;
        info!(bytes = bytes.len(), "decoded uploaded document");
        self.process_bytes_blocking(Bytes::from(bytes)).await
    }

    pub async fn handle_web_event(&self, event: &WebRequestEvent) -> Result<ChunkReport, ProcessError> {
        let upload = parse_web_body(event)?;
        self.handle_upload(upload).await
    }

    /// Processes every record of a bucket notification, writing parts to `output_bucket`.
    ///
    /// The first failing record aborts the event so the invocation is reported as failed.
    #[instrument(skip_all, fields(invocation_id = %Uuid::new_v4(), records = event.records.len()))]
    pub async fn handle_storage_event(
        &self,
        event: &StorageEvent,
        storage: &DocumentStorage,
        output_bucket: &str,
    ) -> Result<StorageEventSummary, ProcessError> {
        if event.records.is_empty() {
            return Err(ProcessError::validation("Storage event contains no records"));
        }

        let mut outcomes = Vec::with_capacity(event.records.len());
        for record in &event.records {
            let key = record.decoded_key();
            let outcome = self
                .process_stored_document(storage, record.bucket(), &key, output_bucket)
                .await?;
            outcomes.push(outcome);
        }

        let chunks_created = outcomes.iter().map(|outcome| outcome.chunks_created).sum();
        let message = match outcomes.as_slice() {
            [single] => format!("Successfully processed {}", single.key),
            many => format!("Successfully processed {} documents", many.len()),
        };

        Ok(StorageEventSummary {
            message,
            chunks_created,
            outcomes,
        })
    }

    pub async fn process_stored_document(
        &self,
        storage: &DocumentStorage,
        bucket: &str,
        key: &str,
        output_bucket: &str,
    ) -> Result<StorageOutcome, ProcessError> {
        info!(bucket, key, "processing stored document");

        let bytes = storage.get_object(bucket, key).await?;
        let report = self.process_bytes_blocking(bytes).await?;

        let mut output_keys = Vec::with_capacity(report.num_chunks);
        for (idx, chunk) in report.chunks.iter().enumerate() {
            let part = part_key(key, idx + 1);
            storage.put_text(output_bucket, &part, chunk).await?;
            info!(
                output_bucket,
                key = %part,
                characters = chunk.chars().count(),
                "uploaded chunk"
            );
            output_keys.push(part);
        }

        Ok(StorageOutcome {
            bucket: bucket.to_string(),
            key: key.to_string(),
            chunks_created: report.num_chunks,
            output_keys,
        })
    }
}
