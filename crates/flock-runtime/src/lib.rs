//! flock-runtime — client for the container runtime's control API.
//!
//! Manages one worker service: desired-count reads and writes, task
//! enumeration with private IPs, and batched termination-protection
//! updates. Implements the `RuntimeClient` port consumed by the scaling
//! engine.

pub mod client;

pub use client::RuntimeApiClient;
