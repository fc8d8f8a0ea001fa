use std::collections::HashMap;

use crate::models::{JobPosting, Role, TrendingRole};
use crate::trends::counter::OrderedCounter;
use crate::trends::window::TrendWindow;

pub const ROLE_CANDIDATE_POOL: usize = 20;
pub const MAX_TRENDING_ROLES: usize = 15;
pub const TOP_SKILLS_PER_ROLE: usize = 5;

/// Role keyword table, scanned in order. The first role with any keyword
/// contained in the lower-cased title wins.
pub const ROLE_KEYWORDS: &[(Role, &[&str])] = &[
    (Role::Developer, &["developer", "dev ", "engineer", "programmer"]),
    (Role::Designer, &["designer", "design"]),
    (Role::Manager, &["manager", "lead", "head"]),
    (Role::Data, &["data scientist", "data analyst", "data engineer"]),
    (Role::Devops, &["devops", "sre", "site reliability"]),
    (Role::Frontend, &["frontend", "front-end", "front end"]),
    (Role::Backend, &["backend", "back-end", "back end"]),
    (Role::Fullstack, &["fullstack", "full-stack", "full stack"]),
    (Role::Mobile, &["mobile", "ios", "android"]),
    (Role::Qa, &["qa", "quality assurance", "tester"]),
    (Role::Product, &["product manager", "product owner"]),
    (Role::Marketing, &["marketing", "growth", "seo"]),
    (Role::Sales, &["sales", "account executive"]),
];

pub fn normalize_role(position: Option<&str>) -> Role {
    let title = match position {
        Some(title) => title.trim().to_lowercase(),
        None => return Role::Other,
    };
    if title.is_empty() {
        return Role::Other;
    }

    ROLE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| title.contains(keyword)))
        .map(|(role, _)| *role)
        .unwrap_or(Role::Other)
}

/// Posting counts per normalized role, ordered by current volume.
pub fn role_trends(postings: &[JobPosting], window: &TrendWindow) -> Vec<TrendingRole> {
    let mut current: OrderedCounter<Role> = OrderedCounter::new();
    let mut previous: OrderedCounter<Role> = OrderedCounter::new();
    let mut role_skills: HashMap<Role, OrderedCounter<String>> = HashMap::new();

    for posting in postings {
        let in_current = window.in_current(&posting.date_posted);
        if !in_current && !window.in_previous(&posting.date_posted) {
            continue;
        }

        let role = normalize_role(posting.position.as_deref());
        if in_current {
            current.add(role);
            let skills = role_skills.entry(role).or_default();
            posting.normalized_tags().for_each(|tag| skills.add(tag));
        } else {
            previous.add(role);
        }
    }

    let mut trending: Vec<TrendingRole> = current
        .most_common(ROLE_CANDIDATE_POOL)
        .into_iter()
        .map(|(role, count)| {
            let top_skills = role_skills
                .get(&role)
                .map(|skills| {
                    skills
                        .most_common(TOP_SKILLS_PER_ROLE)
                        .into_iter()
                        .map(|(skill, _)| skill)
                        .collect()
                })
                .unwrap_or_default();
            TrendingRole::new(role, count, previous.get(&role), top_skills)
        })
        .collect();

    trending.sort_by(|a, b| b.job_count.cmp(&a.job_count));
    trending.truncate(MAX_TRENDING_ROLES);
    trending
}
