//! Configuration module for the voice pipeline.
//!
//! Provides `PipelineConfig` (top-level settings), sub-configs for the
//! capture and synthesis workers, `AppPaths` for cross-platform data
//! directories, and TOML persistence via `PipelineConfig::load` /
//! `PipelineConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{ListenerConfig, PipelineConfig, SynthesisConfig};
