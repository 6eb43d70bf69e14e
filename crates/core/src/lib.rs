pub mod audit;
pub mod config;
pub mod engine;
pub mod job;
pub mod media;
pub mod metrics;
pub mod planner;
pub mod testing;

pub use audit::{create_audit_system, AuditHandle, AuditStore, EncodeRecord, SqliteAuditStore};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, AuditConfig, Config,
    ConfigError,
};
pub use engine::{Engine, EngineConfig, EngineError, FfmpegEngine, MediaProbe, Prober};
pub use job::{
    CancelHandle, DefaultOutputPolicy, EncodedOutput, FileError, JobError, JobRunner, JobState,
    OutputConfig,
};
pub use media::{classify, classify_mime, MediaKind};
pub use planner::{EncodingSettings, ParameterPlan};
