//! # dumpmask-core
//!
//! Configuration shared by the dumpmask crates: the masking rules file
//! (`table -> column -> template`) and the immutable runtime settings that
//! the rule compiler and the stream driver are built from.

pub mod config;

pub use config::{
    ConfigError, MaskRulesFile, MaskSettings, ProcessingMode, DEFAULT_HASH_COST,
    DEFAULT_MAX_LINE_BYTES, MAX_HASH_COST, MIN_HASH_COST,
};
