//! Job lifecycle: records, store, detached launching, lazy status
//! resolution and the supervising facade.

pub mod job;
pub mod launcher;
pub mod status;
pub mod store;
pub mod supervisor;

pub use job::{Job, JobKind, JobStatus};
pub use store::{InMemoryJobStore, JobStore};
pub use supervisor::{JobSupervisor, StatusReport, SubmitRequest};
