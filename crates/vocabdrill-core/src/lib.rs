//! vocabdrill-core: Progression engine, wrong-word ledger, and catalog model.
//!
//! This crate holds everything a vocabulary drill needs that is not tied to a
//! terminal or a remote API: the word catalog, the session state machine that
//! picks questions and moves learners between levels, the per-user ledger of
//! missed words, and the persistence documents behind them.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod model;
pub mod progress;
pub mod review;
pub mod settings;
pub mod speech;
pub mod store;
pub mod story;
pub mod traits;
