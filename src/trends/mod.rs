//! Period-over-period trend computation over the job corpus.
//!
//! The computers in `skills`, `roles` and `clusters` are pure functions of a
//! posting slice and a [`TrendWindow`]; [`TrendAnalyzer`] wires them to the
//! stores and persists snapshots.

pub mod analyzer;
pub mod clusters;
pub mod counter;
pub mod roles;
pub mod skills;
pub mod window;

pub use analyzer::TrendAnalyzer;
pub use clusters::{skill_clusters, ANCHOR_SKILLS};
pub use roles::{normalize_role, role_trends};
pub use skills::skill_trends;
pub use window::TrendWindow;
