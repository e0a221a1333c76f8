//! # lexrag
//!
//! Legal question answering over a private document corpus, with a web
//! search fallback when the corpus cannot support a confident answer.
//!
//! ## Architecture
//!
//! ```text
//!  upload ──▶ extract ──▶ chunk ──▶ embed ──▶ ┌────────────┐ ──▶ index.json
//!                                            │ FlatIndex  │
//!  question ──▶ decode ──▶ embed ──▶ search ◀─┴────────────┘
//!                                      │
//!                                      ▼
//!                          synthesise (corpus) ──▶ confident? ──yes──▶ "Dataset"
//!                                                      │
//!                                                      no
//!                                                      ▼
//!                                  web search ──▶ synthesise (web) ──▶ "Internet"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`error`] | Error taxonomy with HTTP status mapping |
//! | [`models`] | Request/response types |
//! | [`form`] | Multipart and JSON request decoding |
//! | [`extract`] | PDF/DOCX/TXT text extraction |
//! | [`remote`] | Timeout and retry for provider calls |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Text generation providers |
//! | [`web_search`] | Web search providers |
//! | [`store`] | Index persistence and copy-on-write sharing |
//! | [`ingest`] | Extract → chunk → embed → add pipeline |
//! | [`retrieve`] | Question → nearest chunks |
//! | [`synthesize`] | Prompt assembly |
//! | [`escalation`] | Confidence policy and web fallback |
//! | [`service`] | Request routing shared by HTTP and CLI |
//! | [`server`] | axum HTTP server |
//!
//! Chunking, vector math and the index itself live in `lexrag-core`.

pub mod config;
pub mod embedding;
pub mod error;
pub mod escalation;
pub mod extract;
pub mod form;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod remote;
pub mod retrieve;
pub mod server;
pub mod service;
pub mod store;
pub mod synthesize;
pub mod web_search;

pub use error::{Error, Result};
