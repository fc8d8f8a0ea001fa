pub mod config;
pub mod corpus;
pub mod db;
pub mod error;
pub mod models;
pub mod trends;

pub use config::Config;
pub use corpus::{CorpusAccessor, SnapshotStore};
pub use db::Database;
pub use error::{Result, TrendError};
pub use models::{
    AnalysisSummary, CorpusStats, ImportStats, JobPosting, Role, SkillClusterMap, TrendAnalysisSnapshot,
    TrendingRole, TrendingSkill,
};
pub use trends::{TrendAnalyzer, TrendWindow};
