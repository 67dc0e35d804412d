//! Job supervision and artifact delivery for protein structure pipelines.
//!
//! Two kinds of external work are supervised: a containerized
//! structure-prediction pipeline and a direct sequence-design script. Jobs
//! run detached from the supervising process; completion is signaled
//! durably through a sentinel exit-code file and re-derived lazily on each
//! poll. Finished output trees are delivered as full or lite gzip
//! archives, buffered or streamed.

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod jobs;
pub mod selection;
pub mod tools;

pub use archive::ArchiveMode;
pub use config::Config;
pub use error::{FoldrunError, Result};
pub use jobs::{InMemoryJobStore, Job, JobKind, JobStatus, JobStore, JobSupervisor, SubmitRequest};
