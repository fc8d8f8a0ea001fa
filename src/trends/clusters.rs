use crate::models::{JobPosting, SkillClusterMap};
use crate::trends::counter::OrderedCounter;
use crate::trends::window::TrendWindow;

pub const ANCHOR_SKILLS: &[&str] = &["python", "javascript", "react", "node", "aws", "docker", "kubernetes"];

/// Pairs seen together fewer times than this are noise.
pub const MIN_CO_OCCURRENCE: usize = 5;
pub const MAX_CLUSTER_SIZE: usize = 5;

/// Counts unordered tag pairs per posting in the current window.
///
/// A tag repeated within one posting is never paired with itself, so an
/// anchor can't list itself as a related skill. Repeats of a tag still
/// pair with every other distinct tag on the posting.
fn count_pairs(postings: &[JobPosting], window: &TrendWindow) -> OrderedCounter<(String, String)> {
    let mut pairs = OrderedCounter::new();

    for posting in postings.iter().filter(|p| window.in_current(&p.date_posted)) {
        let tags: Vec<String> = posting.normalized_tags().collect();
        if tags.len() < 2 {
            continue;
        }

        for (i, first) in tags.iter().enumerate() {
            for second in &tags[i + 1..] {
                // self-pairs are skipped on purpose
                if first == second {
                    continue;
                }
                let pair = if first <= second {
                    (first.clone(), second.clone())
                } else {
                    (second.clone(), first.clone())
                };
                pairs.add(pair);
            }
        }
    }

    pairs
}

/// For each anchor skill, the skills it most often appears alongside.
/// Every anchor is present in the result, possibly with an empty list.
pub fn skill_clusters(postings: &[JobPosting], window: &TrendWindow) -> SkillClusterMap {
    let pairs = count_pairs(postings, window);

    ANCHOR_SKILLS
        .iter()
        .map(|&anchor| {
            let mut related: Vec<(&str, usize)> = pairs
                .iter()
                .filter(|(_, count)| *count >= MIN_CO_OCCURRENCE)
                .filter_map(|((a, b), count)| {
                    if a == anchor {
                        Some((b.as_str(), count))
                    } else if b == anchor {
                        Some((a.as_str(), count))
                    } else {
                        None
                    }
                })
                .collect();

            related.sort_by(|x, y| y.1.cmp(&x.1));
            let cluster: Vec<String> = related
                .into_iter()
                .take(MAX_CLUSTER_SIZE)
                .map(|(skill, _)| skill.to_string())
                .collect();

            (anchor.to_string(), cluster)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trends::test_support::{fixed_now, posting};
    use chrono::Duration;

    fn repeated(prefix: &str, times: usize, tags: &[&str], days_ago: i64) -> Vec<JobPosting> {
        let now = fixed_now();
        (0..times)
            .map(|i| posting(&format!("{}{}", prefix, i), "Dev", tags, now - Duration::days(days_ago)))
            .collect()
    }

    #[test]
    fn test_every_anchor_present_on_empty_corpus() {
        let clusters = skill_clusters(&[], &TrendWindow::new(fixed_now(), 30));
        assert_eq!(clusters.len(), ANCHOR_SKILLS.len());
        for anchor in ANCHOR_SKILLS {
            assert!(clusters[*anchor].is_empty());
        }
    }

    #[test]
    fn test_pairs_below_threshold_are_excluded() {
        let mut postings = repeated("a", 5, &["python", "django"], 1);
        postings.extend(repeated("b", 4, &["python", "flask"], 1));

        let clusters = skill_clusters(&postings, &TrendWindow::new(fixed_now(), 30));
        assert_eq!(clusters["python"], vec!["django"]);
    }

    #[test]
    fn test_pairs_are_order_independent() {
        let mut postings = repeated("a", 3, &["Docker", "AWS"], 1);
        postings.extend(repeated("b", 2, &["aws", "docker"], 1));

        let clusters = skill_clusters(&postings, &TrendWindow::new(fixed_now(), 30));
        assert_eq!(clusters["aws"], vec!["docker"]);
        assert_eq!(clusters["docker"], vec!["aws"]);
    }

    #[test]
    fn test_ranked_by_count_and_capped() {
        let mut postings = Vec::new();
        postings.extend(repeated("a", 5, &["react", "redux"], 1));
        postings.extend(repeated("b", 9, &["react", "typescript"], 1));
        postings.extend(repeated("c", 7, &["react", "next"], 1));
        postings.extend(repeated("d", 5, &["react", "jest"], 1));
        postings.extend(repeated("e", 6, &["react", "css"], 1));
        postings.extend(repeated("f", 5, &["react", "graphql"], 1));

        let clusters = skill_clusters(&postings, &TrendWindow::new(fixed_now(), 30));
        assert_eq!(clusters["react"], vec!["typescript", "next", "css", "redux", "jest"]);
    }

    #[test]
    fn test_only_current_window_counts() {
        let mut postings = repeated("a", 3, &["kubernetes", "helm"], 1);
        postings.extend(repeated("b", 3, &["kubernetes", "helm"], 45));

        let clusters = skill_clusters(&postings, &TrendWindow::new(fixed_now(), 30));
        assert!(clusters["kubernetes"].is_empty());
    }

    #[test]
    fn test_single_tag_adds_no_pairs() {
        let postings = repeated("a", 6, &["node"], 1);

        let clusters = skill_clusters(&postings, &TrendWindow::new(fixed_now(), 30));
        assert!(clusters["node"].is_empty());
    }

    #[test]
    fn test_repeated_tag_never_pairs_with_itself() {
        let postings = repeated("b", 6, &["node", "Node ", "node"], 1);

        let clusters = skill_clusters(&postings, &TrendWindow::new(fixed_now(), 30));
        assert!(clusters["node"].is_empty());
    }
}
