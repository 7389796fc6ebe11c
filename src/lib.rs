#![deny(missing_docs)]

//! Core library for the docdigest PDF and text summarization server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF text and embedded-image extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Summarization counters.
pub mod metrics;
/// OCR engine abstraction and the Tesseract adapter.
pub mod ocr;
/// Chunking and summarization pipeline.
pub mod processing;
/// Summarization model clients.
pub mod summarization;
