use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::trends::window::growth_rate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub date_posted: DateTime<Utc>,
}

impl JobPosting {
    /// Tags trimmed and lower-cased, with empty entries dropped.
    pub fn normalized_tags(&self) -> impl Iterator<Item = String> + '_ {
        self.tags
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
    }
}

/// Normalized role taxonomy. Serializes as the title-cased role name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Developer,
    Designer,
    Manager,
    Data,
    Devops,
    Frontend,
    Backend,
    Fullstack,
    Mobile,
    Qa,
    Product,
    Marketing,
    Sales,
    Other,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Developer => "Developer",
            Role::Designer => "Designer",
            Role::Manager => "Manager",
            Role::Data => "Data",
            Role::Devops => "Devops",
            Role::Frontend => "Frontend",
            Role::Backend => "Backend",
            Role::Fullstack => "Fullstack",
            Role::Mobile => "Mobile",
            Role::Qa => "Qa",
            Role::Product => "Product",
            Role::Marketing => "Marketing",
            Role::Sales => "Sales",
            Role::Other => "Other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingSkill {
    pub skill_name: String,
    pub current_mentions: usize,
    pub previous_mentions: usize,
    pub growth_rate: f64,
    pub growth_percentage: String,
}

/// Minimum current mentions for a skill with no prior mentions to count as growing.
pub const SKILL_NOISE_THRESHOLD: usize = 5;

impl TrendingSkill {
    pub fn new(skill_name: String, current_mentions: usize, previous_mentions: usize) -> Self {
        let rate = growth_rate(current_mentions, previous_mentions, SKILL_NOISE_THRESHOLD);
        Self {
            skill_name,
            current_mentions,
            previous_mentions,
            growth_rate: round2(rate),
            growth_percentage: format!("{:+.1}%", rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingRole {
    pub role_name: Role,
    pub job_count: usize,
    pub growth_rate: f64,
    pub top_skills: Vec<String>,
}

/// Roles are lower volume than tags, so the noise floor is lower too.
pub const ROLE_NOISE_THRESHOLD: usize = 3;

impl TrendingRole {
    pub fn new(role_name: Role, job_count: usize, previous_count: usize, top_skills: Vec<String>) -> Self {
        let rate = growth_rate(job_count, previous_count, ROLE_NOISE_THRESHOLD);
        Self {
            role_name,
            job_count,
            growth_rate: round2(rate),
            top_skills,
        }
    }
}

/// Anchor skill -> co-occurring skills, most frequent first.
pub type SkillClusterMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysisSnapshot {
    pub analysis_date: DateTime<Utc>,
    pub window_days: i64,
    pub trending_skills: Vec<TrendingSkill>,
    pub trending_roles: Vec<TrendingRole>,
    pub total_jobs_analyzed: usize,
    pub unique_skills_found: usize,
    pub unique_companies: usize,
    pub skill_clusters: SkillClusterMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub success: bool,
    pub trending_skills_count: usize,
    pub trending_roles_count: usize,
    pub total_jobs_analyzed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_jobs: usize,
    pub total_companies: usize,
    pub jobs_last_24h: usize,
    pub jobs_last_7d: usize,
    pub most_active_company: Option<String>,
    pub most_demanded_skill: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Two-decimal rounding with exact halves going to the even neighbour,
/// so 3.125 becomes 3.12 and -90.625 becomes -90.62.
pub(crate) fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    scaled.round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_defaults_missing_fields() {
        let posting: JobPosting =
            serde_json::from_str(r#"{"id": "wwr-1", "date_posted": "2026-05-01T09:30:00+02:00"}"#).unwrap();
        assert!(posting.position.is_none());
        assert!(posting.tags.is_empty());
        assert!(posting.company.is_none());
        assert_eq!(posting.date_posted.to_rfc3339(), "2026-05-01T07:30:00+00:00");
    }

    #[test]
    fn test_normalized_tags_trims_and_drops_empty() {
        let posting: JobPosting = serde_json::from_str(
            r#"{"id": "1", "tags": [" Python ", "", "AWS", "   "], "date_posted": "2026-05-01T00:00:00Z"}"#,
        )
        .unwrap();
        let tags: Vec<String> = posting.normalized_tags().collect();
        assert_eq!(tags, vec!["python", "aws"]);
    }

    #[test]
    fn test_trending_skill_derives_growth() {
        let falling = TrendingSkill::new("java".to_string(), 3, 4);
        assert_eq!(falling.growth_rate, -25.0);
        assert_eq!(falling.growth_percentage, "-25.0%");

        let quiet = TrendingSkill::new("elm".to_string(), 5, 0);
        assert_eq!(quiet.growth_rate, 0.0);
        assert_eq!(quiet.growth_percentage, "+0.0%");
    }

    #[test]
    fn test_growth_rate_rounds_half_to_even() {
        assert_eq!(TrendingSkill::new("go".to_string(), 33, 32).growth_rate, 3.12);
        assert_eq!(TrendingSkill::new("go".to_string(), 3, 32).growth_rate, -90.62);
        assert_eq!(TrendingRole::new(Role::Qa, 33, 32, vec![]).growth_rate, 3.12);

        // 35/32 lands on 9.375, whose even neighbour is above
        assert_eq!(TrendingSkill::new("go".to_string(), 35, 32).growth_rate, 9.38);
    }

    #[test]
    fn test_role_display_pads() {
        assert_eq!(format!("{:<6}|", Role::Qa), "Qa    |");
    }
}
