//! Multi-repository workspace management on top of git worktrees.
//!
//! Arborist (`arb`) coordinates parallel worktrees of several canonical
//! clones, all checked out to one feature branch per workspace. The library
//! API exists for the `arb` binary and the integration test suite; it is not
//! stable.

pub mod cache;
pub mod context;
pub mod error;
pub mod fetch;
pub mod git;
pub mod plan;
pub mod remotes;
pub mod status;
pub mod styling;
pub mod summary;
pub mod workspace;

pub use error::ArbError;
