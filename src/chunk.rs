//! Paragraph-boundary document chunker and document upload.
//!
//! Splitting happens only on paragraph boundaries (`\n\n`). Paragraphs are
//! accumulated until adding the next one would push the buffer past the
//! character budget, then the buffer is flushed. A paragraph longer than the
//! budget is never split, so a document without blank lines is a single
//! chunk no matter its length. Budgets count characters, not bytes.
//!
//! Paragraphs are accumulated as written; only the flushed chunk is trimmed.
//! Runs of blank lines therefore still count toward the budget.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::knowledge::KnowledgeBase;
use crate::models::{KnowledgeMetadata, KnowledgeType, NewKnowledge};

pub const DEFAULT_SOURCE: &str = "User Upload";

fn flush(chunks: &mut Vec<String>, buffer: &str) {
    let chunk = buffer.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}

/// Split `text` on paragraph boundaries into chunks of roughly `budget`
/// characters. Returns no chunks for blank input.
pub fn chunk_document(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    // Character count of `current`.
    let mut current_chars = 0usize;

    for para in text.split("\n\n") {
        let para_chars = para.chars().count();
        if current_chars > 0 && current_chars + para_chars > budget {
            flush(&mut chunks, &current);
            current = para.to_string();
            current_chars = para_chars;
            continue;
        }
        if current_chars > 0 {
            current.push_str("\n\n");
            current_chars += 2;
        }
        current.push_str(para);
        current_chars += para_chars;
    }

    flush(&mut chunks, &current);
    chunks
}

/// A document to be chunked into the knowledge base.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub document_type: Option<KnowledgeType>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub title: String,
    pub chunks_created: usize,
    pub ids: Vec<String>,
}

/// Chunk `req.content` and store every chunk as its own document.
///
/// Each chunk is stored as `**<title> - Part <n>**` followed by the chunk
/// text, tagged with the request's tags plus `document_chunk` and
/// `chunk_<i>`.
pub async fn ingest_document(
    kb: &KnowledgeBase,
    req: UploadRequest,
    default_chunk_size: usize,
) -> Result<UploadSummary> {
    let title = req.title.trim();
    if title.is_empty() || req.content.trim().is_empty() {
        bail!("title and content are required");
    }
    let budget = req.chunk_size.unwrap_or(default_chunk_size);
    if budget == 0 {
        bail!("chunkSize must be greater than 0");
    }

    let kind = req.document_type.unwrap_or(KnowledgeType::ExpertArticle);
    let source = req
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let chunks = chunk_document(&req.content, budget);
    let mut ids = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let mut tags = req.tags.clone();
        tags.push("document_chunk".to_string());
        tags.push(format!("chunk_{}", i));

        let id = kb
            .add(NewKnowledge {
                kind,
                content: format!("**{} - Part {}**\n\n{}", title, i + 1, chunk),
                metadata: KnowledgeMetadata {
                    tags: Some(tags),
                    source: Some(source.clone()),
                    confidence: Some(0.9),
                    ..Default::default()
                },
            })
            .await?;
        ids.push(id);
    }

    info!(title = %title, chunks = ids.len(), "document ingested");
    Ok(UploadSummary {
        title: title.to_string(),
        chunks_created: ids.len(),
        ids,
    })
}
