use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

pub const DEFAULT_UPLOAD_FILENAME: &str = "upload.pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub chunks: Vec<String>,
    pub total_characters: usize,
    pub num_chunks: usize,
}

impl ChunkReport {
    pub fn new(chunks: Vec<String>, normalized_text: &str) -> Self {
        Self {
            num_chunks: chunks.len(),
            total_characters: normalized_text.chars().count(),
            chunks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub pdf: String,
    #[serde(default = "default_filename")]
    pub filename: String,
}

fn default_filename() -> String {
    DEFAULT_UPLOAD_FILENAME.to_string()
}

/// Wire shape returned by the synchronous surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_characters: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChunkResponse {
    pub fn ok(report: ChunkReport) -> Self {
        Self {
            success: true,
            chunks: Some(report.chunks),
            total_characters: Some(report.total_characters),
            num_chunks: Some(report.num_chunks),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            chunks: None,
            total_characters: None,
            num_chunks: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records")]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl StorageEventRecord {
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    /// Object keys in notifications are form-encoded (`+` for space, `%XX`).
    pub fn decoded_key(&self) -> String {
        let spaced = self.s3.object.key.replace('+', " ");
        percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageOutcome {
    pub bucket: String,
    pub key: String,
    pub chunks_created: usize,
    pub output_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEventSummary {
    pub message: String,
    pub chunks_created: usize,
    pub outcomes: Vec<StorageOutcome>,
}

/// Function-style envelope: either a bucket notification or a proxied web request.
///
/// Payloads carrying a `Records` key are bucket notifications.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InvocationEvent {
    Storage(StorageEvent),
    Web(WebRequestEvent),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRequestEvent {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub http: Option<HttpContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpContext {
    #[serde(default)]
    pub source_ip: Option<String>,
}

impl WebRequestEvent {
    pub fn source_ip(&self) -> &str {
        self.request_context
            .as_ref()
            .and_then(|ctx| ctx.http.as_ref())
            .and_then(|http| http.source_ip.as_deref())
            .unwrap_or("unknown")
    }
}

/// Strips every `.pdf` / `.PDF` occurrence from a source key.
pub fn output_base_name(key: &str) -> String {
    key.replace(".pdf", "").replace(".PDF", "")
}

/// `<base>_part<index>.txt`, with a 1-based index.
pub fn part_key(source_key: &str, index: usize) -> String {
    format!("{}_part{}.txt", output_base_name(source_key), index)
}
