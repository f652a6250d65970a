//! Core domain model: jobs, submissions, artifacts, and the scan worker seam.

pub mod artifact;
pub mod job;
pub mod scan;
pub mod services;
pub mod submission;
