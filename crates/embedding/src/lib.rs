//! # Codescope Embedding
//!
//! Fixed-width numeric vectors summarizing code for similarity comparison.
//!
//! Two modes:
//! - **semantic** delegates to an external pretrained model behind the
//!   [`EmbeddingModel`] trait; any failure there falls through transparently
//!   to feature mode
//! - **feature** composes deterministic lexical, structural, and stylistic
//!   features from the text and (when available) its syntax tree
//!
//! Vectors are resized to the configured width: shorter vectors are
//! zero-padded and the remaining slots filled with a `tanh` combination of
//! existing features (literal zeros would degrade cosine similarity), longer
//! vectors are down-sampled by even-stride selection.

mod error;
mod features;
mod generator;

pub use error::{EmbeddingError, Result};
pub use generator::{
    cosine_similarity, EmbeddingConfig, EmbeddingGenerator, EmbeddingMode, EmbeddingModel,
};
