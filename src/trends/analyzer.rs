use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{validate_window, Config};
use crate::corpus::{CorpusAccessor, SnapshotStore};
use crate::error::{Result, TrendError};
use crate::models::{
    AnalysisSummary, JobPosting, SkillClusterMap, TrendAnalysisSnapshot, TrendingRole, TrendingSkill,
};
use crate::trends::clusters::skill_clusters;
use crate::trends::roles::role_trends;
use crate::trends::skills::skill_trends;
use crate::trends::window::TrendWindow;

/// Most snapshots a single history query returns.
pub const MAX_HISTORY_LIMIT: usize = 50;

/// Entry point for trend queries and full analysis runs.
///
/// Full runs are serialized: at most one is in flight per analyzer, and a
/// second caller waits for the first to finish.
pub struct TrendAnalyzer<S> {
    store: Arc<S>,
    timeout: Duration,
    run_lock: Mutex<()>,
}

impl<S> TrendAnalyzer<S>
where
    S: CorpusAccessor + SnapshotStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        Self::with_timeout(store, config.timeout)
    }

    pub fn with_timeout(store: Arc<S>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            run_lock: Mutex::new(()),
        }
    }

    pub fn analyze_skill_trends(&self, window_days: i64) -> Result<Vec<TrendingSkill>> {
        let window = TrendWindow::ending_now(validate_window(window_days)?);
        let postings = load_corpus(self.store.as_ref(), &window)?;
        Ok(skill_trends(&postings, &window))
    }

    pub fn analyze_role_trends(&self, window_days: i64) -> Result<Vec<TrendingRole>> {
        let window = TrendWindow::ending_now(validate_window(window_days)?);
        let postings = load_corpus(self.store.as_ref(), &window)?;
        Ok(role_trends(&postings, &window))
    }

    pub fn identify_clusters(&self, window_days: i64) -> Result<SkillClusterMap> {
        let window = TrendWindow::ending_now(validate_window(window_days)?);
        let postings = self
            .store
            .fetch_postings(window.current_start(), Some(window.now()))?;
        Ok(skill_clusters(&postings, &window))
    }

    /// Runs every computer over one corpus read and persists a snapshot.
    pub async fn run_full_analysis(&self, window_days: i64) -> Result<AnalysisSummary> {
        let window_days = validate_window(window_days)?;
        self.run_full_analysis_at(TrendWindow::ending_now(window_days)).await
    }

    pub async fn run_full_analysis_at(&self, window: TrendWindow) -> Result<AnalysisSummary> {
        let _running = self.run_lock.lock().await;
        let started = Instant::now();
        info!(window_days = window.days(), "starting trend analysis");

        let snapshot = match self.compute_snapshot(window).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(window_days = window.days(), error = %e, "trend analysis failed");
                return Err(e);
            }
        };

        let summary = AnalysisSummary {
            success: true,
            trending_skills_count: snapshot.trending_skills.len(),
            trending_roles_count: snapshot.trending_roles.len(),
            total_jobs_analyzed: snapshot.total_jobs_analyzed,
        };

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save_snapshot(&snapshot))
            .await
            .map_err(|e| TrendError::Worker(e.to_string()))?
            .inspect_err(|e| error!(error = %e, "failed to persist trend snapshot"))?;

        info!(
            window_days = window.days(),
            skills = summary.trending_skills_count,
            roles = summary.trending_roles_count,
            jobs = summary.total_jobs_analyzed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trend analysis completed"
        );
        Ok(summary)
    }

    async fn compute_snapshot(&self, window: TrendWindow) -> Result<TrendAnalysisSnapshot> {
        let store = Arc::clone(&self.store);
        let worker = tokio::task::spawn_blocking(move || build_snapshot(store.as_ref(), &window));

        match tokio::time::timeout(self.timeout, worker).await {
            Ok(joined) => joined.map_err(|e| TrendError::Worker(e.to_string()))?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "trend analysis timed out");
                Err(TrendError::Timeout {
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    pub fn latest_snapshot(&self) -> Result<Option<TrendAnalysisSnapshot>> {
        self.store.latest_snapshot()
    }

    /// Snapshots from the last `days_ago` days (7..=365), newest first.
    pub fn snapshot_history(&self, days_ago: i64, limit: usize) -> Result<Vec<TrendAnalysisSnapshot>> {
        let days_ago = validate_window(days_ago)?;
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(TrendError::InvalidLimit(limit));
        }
        self.store.snapshots_since(days_ago, limit)
    }
}

/// Both windows in a single read, so every computer sees the same boundary.
fn load_corpus<C: CorpusAccessor + ?Sized>(corpus: &C, window: &TrendWindow) -> Result<Vec<JobPosting>> {
    corpus.fetch_postings(window.previous_start(), Some(window.now()))
}

fn build_snapshot<C: CorpusAccessor + ?Sized>(corpus: &C, window: &TrendWindow) -> Result<TrendAnalysisSnapshot> {
    let postings = load_corpus(corpus, window)?;

    let trending_skills = skill_trends(&postings, window);
    debug!(count = trending_skills.len(), "computed skill trends");
    let trending_roles = role_trends(&postings, window);
    debug!(count = trending_roles.len(), "computed role trends");
    let skill_clusters = skill_clusters(&postings, window);
    debug!(anchors = skill_clusters.len(), "computed skill clusters");

    let total_jobs_analyzed = postings
        .iter()
        .filter(|p| window.in_current(&p.date_posted))
        .count();
    let unique_companies = corpus.count_distinct_companies(window.current_start(), Some(window.now()))?;

    Ok(TrendAnalysisSnapshot {
        analysis_date: window.now(),
        window_days: window.days(),
        unique_skills_found: trending_skills.len(),
        trending_skills,
        trending_roles,
        total_jobs_analyzed,
        unique_companies,
        skill_clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Role;
    use crate::trends::clusters::ANCHOR_SKILLS;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded_db(postings: &[JobPosting]) -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db.import_postings(postings).unwrap();
        Arc::new(db)
    }

    fn posting(id: &str, position: &str, company: &str, tags: &[&str], days_ago: i64) -> JobPosting {
        JobPosting {
            id: id.to_string(),
            position: Some(position.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            company: Some(company.to_string()),
            date_posted: Utc::now() - ChronoDuration::days(days_ago) - ChronoDuration::minutes(5),
        }
    }

    /// Store whose corpus reads fail; counts snapshot writes.
    #[derive(Default)]
    struct BrokenCorpus {
        saves: AtomicUsize,
    }

    impl CorpusAccessor for BrokenCorpus {
        fn fetch_postings(&self, _: DateTime<Utc>, _: Option<DateTime<Utc>>) -> Result<Vec<JobPosting>> {
            Err(TrendError::Store("corpus unavailable".to_string()))
        }

        fn count_distinct_companies(&self, _: DateTime<Utc>, _: Option<DateTime<Utc>>) -> Result<usize> {
            Err(TrendError::Store("corpus unavailable".to_string()))
        }
    }

    impl SnapshotStore for BrokenCorpus {
        fn save_snapshot(&self, _: &TrendAnalysisSnapshot) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn latest_snapshot(&self) -> Result<Option<TrendAnalysisSnapshot>> {
            Ok(None)
        }

        fn snapshots_since(&self, _: i64, _: usize) -> Result<Vec<TrendAnalysisSnapshot>> {
            Ok(Vec::new())
        }
    }

    /// Wraps a database and stalls every corpus read.
    struct SlowCorpus {
        inner: Database,
        delay: std::time::Duration,
    }

    impl CorpusAccessor for SlowCorpus {
        fn fetch_postings(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<Vec<JobPosting>> {
            std::thread::sleep(self.delay);
            self.inner.fetch_postings(from, to)
        }

        fn count_distinct_companies(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<usize> {
            self.inner.count_distinct_companies(from, to)
        }
    }

    impl SnapshotStore for SlowCorpus {
        fn save_snapshot(&self, snapshot: &TrendAnalysisSnapshot) -> Result<()> {
            self.inner.save_snapshot(snapshot)
        }

        fn latest_snapshot(&self) -> Result<Option<TrendAnalysisSnapshot>> {
            self.inner.latest_snapshot()
        }

        fn snapshots_since(&self, days_ago: i64, limit: usize) -> Result<Vec<TrendAnalysisSnapshot>> {
            self.inner.snapshots_since(days_ago, limit)
        }
    }

    fn analyzer<S>(store: Arc<S>) -> TrendAnalyzer<S>
    where
        S: CorpusAccessor + SnapshotStore + Send + Sync + 'static,
    {
        TrendAnalyzer::with_timeout(store, std::time::Duration::from_secs(10))
    }

    #[test]
    fn test_query_operations_over_stored_corpus() {
        let db = seeded_db(&[
            posting("1", "Python Developer", "Acme", &["python", "django"], 1),
            posting("2", "Python Developer", "Beta", &["python", "django"], 2),
            posting("3", "Python Developer", "Acme", &["python", "flask"], 40),
        ]);
        let analyzer = analyzer(db);

        let skills = analyzer.analyze_skill_trends(30).unwrap();
        assert_eq!(skills[0].skill_name, "python");
        assert_eq!(skills[0].growth_rate, 100.0);
        assert_eq!(skills[0].growth_percentage, "+100.0%");
        assert_eq!(skills[1].skill_name, "django");
        assert_eq!(skills[1].growth_rate, 0.0);

        let roles = analyzer.analyze_role_trends(30).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role_name, Role::Developer);
        assert_eq!(roles[0].job_count, 2);
        assert_eq!(roles[0].top_skills, vec!["python", "django"]);

        let clusters = analyzer.identify_clusters(30).unwrap();
        assert_eq!(clusters.len(), ANCHOR_SKILLS.len());
        assert!(clusters["python"].is_empty());
    }

    #[test]
    fn test_query_operations_reject_invalid_window() {
        let analyzer = analyzer(seeded_db(&[]));
        assert!(matches!(analyzer.analyze_skill_trends(3), Err(TrendError::InvalidWindow(3))));
        assert!(matches!(analyzer.analyze_role_trends(400), Err(TrendError::InvalidWindow(400))));
        assert!(matches!(analyzer.identify_clusters(0), Err(TrendError::InvalidWindow(0))));
    }

    #[tokio::test]
    async fn test_full_analysis_on_empty_corpus_persists_snapshot() {
        let db = seeded_db(&[]);
        let analyzer = analyzer(Arc::clone(&db));

        let summary = analyzer.run_full_analysis(30).await.unwrap();
        assert_eq!(
            summary,
            AnalysisSummary {
                success: true,
                trending_skills_count: 0,
                trending_roles_count: 0,
                total_jobs_analyzed: 0,
            }
        );

        let snapshot = analyzer.latest_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.window_days, 30);
        assert_eq!(snapshot.total_jobs_analyzed, 0);
        assert_eq!(snapshot.unique_companies, 0);
        assert_eq!(snapshot.unique_skills_found, 0);
        assert!(snapshot.trending_skills.is_empty());
        assert!(snapshot.trending_roles.is_empty());
        assert_eq!(snapshot.skill_clusters.len(), ANCHOR_SKILLS.len());
        assert!(snapshot.skill_clusters.values().all(|c| c.is_empty()));
    }

    #[tokio::test]
    async fn test_full_analysis_counts_current_window_only() {
        let mut postings = vec![
            posting("old-1", "Designer", "Gamma", &["figma"], 45),
            posting("old-2", "Designer", "Gamma", &["figma"], 50),
        ];
        for i in 0..6 {
            let company = if i % 2 == 0 { "Acme" } else { "Beta" };
            postings.push(posting(&format!("new-{}", i), "DevOps Specialist", company, &["aws", "docker"], 3));
        }
        let db = seeded_db(&postings);
        let analyzer = analyzer(Arc::clone(&db));

        let summary = analyzer.run_full_analysis(30).await.unwrap();
        assert!(summary.success);
        assert_eq!(summary.total_jobs_analyzed, 6);
        assert_eq!(summary.trending_skills_count, 2);
        assert_eq!(summary.trending_roles_count, 1);

        let snapshot = db.latest_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.unique_companies, 2);
        assert_eq!(snapshot.unique_skills_found, 2);
        assert_eq!(snapshot.trending_roles[0].role_name, Role::Devops);
        assert_eq!(snapshot.trending_roles[0].growth_rate, 6.0);
        assert_eq!(snapshot.skill_clusters["aws"], vec!["docker"]);
        assert_eq!(snapshot.skill_clusters["docker"], vec!["aws"]);
    }

    #[tokio::test]
    async fn test_failed_corpus_read_persists_nothing() {
        let store = Arc::new(BrokenCorpus::default());
        let analyzer = analyzer(Arc::clone(&store));

        let err = analyzer.run_full_analysis(30).await.unwrap_err();
        assert!(err.is_data_access());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_persists_nothing() {
        let inner = Database::open_in_memory().unwrap();
        inner.init().unwrap();
        let store = Arc::new(SlowCorpus {
            inner,
            delay: std::time::Duration::from_millis(300),
        });
        let analyzer = TrendAnalyzer::with_timeout(Arc::clone(&store), std::time::Duration::from_millis(20));

        let err = analyzer.run_full_analysis(30).await.unwrap_err();
        assert!(matches!(err, TrendError::Timeout { .. }));
        assert!(store.latest_snapshot().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_runs_each_produce_a_snapshot() {
        let db = seeded_db(&[posting("1", "QA Tester", "Acme", &["selenium"], 1)]);
        let analyzer = analyzer(Arc::clone(&db));

        let (first, second) = tokio::join!(analyzer.run_full_analysis(30), analyzer.run_full_analysis(30));
        assert!(first.unwrap().success);
        assert!(second.unwrap().success);
        assert_eq!(analyzer.snapshot_history(30, 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_snapshot_none_before_first_run() {
        let analyzer = analyzer(seeded_db(&[]));
        assert!(analyzer.latest_snapshot().unwrap().is_none());
        assert!(analyzer.snapshot_history(30, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_history_rejects_out_of_range_arguments() {
        let analyzer = analyzer(seeded_db(&[]));
        analyzer.run_full_analysis(30).await.unwrap();

        assert!(matches!(analyzer.snapshot_history(-5, 10), Err(TrendError::InvalidWindow(-5))));
        assert!(matches!(analyzer.snapshot_history(6, 10), Err(TrendError::InvalidWindow(6))));
        assert!(matches!(analyzer.snapshot_history(366, 10), Err(TrendError::InvalidWindow(366))));
        assert!(matches!(analyzer.snapshot_history(30, 0), Err(TrendError::InvalidLimit(0))));
        assert!(matches!(analyzer.snapshot_history(30, 51), Err(TrendError::InvalidLimit(51))));

        assert_eq!(analyzer.snapshot_history(7, 1).unwrap().len(), 1);
        assert_eq!(analyzer.snapshot_history(365, MAX_HISTORY_LIMIT).unwrap().len(), 1);
    }
}
