#![deny(missing_docs)]

//! Core library for the DocuHelper document ingestion pipeline.

/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Plain-text extraction from PDF, DOCX, and TXT uploads.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Bounded retries for model calls.
pub mod retry;
/// Summarization client abstraction and adapters.
pub mod summarization;
