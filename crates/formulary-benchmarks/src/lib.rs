//! Formulary benchmarking suite
//!
//! Benchmarks for formula rewriting, dependency resolution and archive
//! handling, plus the synthetic inputs they share.

pub mod common;

pub use common::*;
