use std::cmp::Ordering;

use crate::models::{JobPosting, TrendingSkill};
use crate::trends::counter::OrderedCounter;
use crate::trends::window::TrendWindow;

/// Only the most-mentioned skills in the current window are ranked.
pub const SKILL_CANDIDATE_POOL: usize = 50;
pub const MAX_TRENDING_SKILLS: usize = 20;

/// Per-skill mention counts in the current and previous windows, ranked by growth.
pub fn skill_trends(postings: &[JobPosting], window: &TrendWindow) -> Vec<TrendingSkill> {
    let mut current: OrderedCounter<String> = OrderedCounter::new();
    let mut previous: OrderedCounter<String> = OrderedCounter::new();

    for posting in postings {
        if window.in_current(&posting.date_posted) {
            posting.normalized_tags().for_each(|tag| current.add(tag));
        } else if window.in_previous(&posting.date_posted) {
            posting.normalized_tags().for_each(|tag| previous.add(tag));
        }
    }

    let mut trending: Vec<TrendingSkill> = current
        .most_common(SKILL_CANDIDATE_POOL)
        .into_iter()
        .map(|(skill, count)| {
            let previous_count = previous.get(&skill);
            TrendingSkill::new(skill, count, previous_count)
        })
        .collect();

    trending.sort_by(|a, b| b.growth_rate.partial_cmp(&a.growth_rate).unwrap_or(Ordering::Equal));
    trending.truncate(MAX_TRENDING_SKILLS);
    trending
}
