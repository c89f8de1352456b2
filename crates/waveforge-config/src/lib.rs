//! Layered configuration for waveforge runs.

pub mod config;

pub use config::{
    AnalyzerConfig, BudgetConfig, CliArgs, Config, ConfigBuilder, ConfigSource, ExecutionConfig,
    LoggingConfig, QualityConfig, RepairConfig,
};
