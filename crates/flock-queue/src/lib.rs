//! flock-queue — client for the remote job-queue service.
//!
//! Wraps the service's REST API for one agent pool: paginated agent
//! listing and pending-job counts. Implements the `JobServiceClient`
//! port consumed by the scaling engine.

pub mod client;

pub use client::QueueClient;
