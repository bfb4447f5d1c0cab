//! Visibility-Timeout Queue: a single SQL primitive that subsumes leader
//! election, work distribution, and elastic overflow via visibility
//! timeouts.

pub mod error;
pub mod job;
mod run_batch;
pub mod vtq;

#[cfg(test)]
mod tests;

pub use error::VtqError;
pub use job::Job;
pub use vtq::Vtq;
