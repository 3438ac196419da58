//! Timestep export: job description, input checks, run directory staging
//! and the per-timestep export pipeline.

pub mod inputs;
pub mod job;
pub mod pipeline;
pub mod staging;

pub use inputs::{discover_timesteps, ensure_supported, verify, verify_sources, verify_timesteps};
pub use job::{default_trn_dir, JobDescriptor, Location, OutputOptions, Source};
pub use pipeline::{ExportPipeline, ExportTools};
pub use staging::{prepare, prepare_at, run_dir_name, StagingPaths, TrnStaging};
