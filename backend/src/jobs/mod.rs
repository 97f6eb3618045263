// Background Jobs
//
// Scheduled with tokio-cron-scheduler; currently only the workflow job sweep.

pub mod scheduler;

pub use scheduler::JobScheduler;
