//! # lexrag core
//!
//! Shared, WASM-safe logic for lexrag: the chunk data model, the
//! fixed-window chunker, vector utilities, and the embedding index.
//!
//! This crate contains no tokio, network clients, filesystem I/O, or other
//! native-only dependencies. Persistence and the external capabilities
//! (embedding, generation, web search, text extraction) live in the
//! `lexrag` application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;

pub use error::{Error, Result};
