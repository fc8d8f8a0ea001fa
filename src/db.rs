use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::corpus::{CorpusAccessor, SnapshotStore};
use crate::error::{Result, TrendError};
use crate::models::{CorpusStats, ImportStats, JobPosting, TrendAnalysisSnapshot};

pub struct Database {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TrendError::Store(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrendError::Store("database connection lock poisoned".to_string()))
    }

    pub fn init(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_postings (
                id TEXT PRIMARY KEY,
                company TEXT,
                position TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                date_posted TEXT NOT NULL,
                date_scraped TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS trend_analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                analysis_date TEXT NOT NULL,
                analysis_window_days INTEGER NOT NULL,
                trending_skills TEXT NOT NULL,
                trending_roles TEXT NOT NULL,
                total_jobs_analyzed INTEGER NOT NULL,
                unique_skills_found INTEGER NOT NULL,
                unique_companies INTEGER NOT NULL,
                skill_clusters TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_postings_date ON job_postings(date_posted);
            CREATE INDEX IF NOT EXISTS idx_postings_date_company ON job_postings(date_posted, company);
            CREATE INDEX IF NOT EXISTS idx_analysis_date ON trend_analyses(analysis_date);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table' AND name IN ('job_postings', 'trend_analyses')",
            [],
            |row| row.get(0),
        )?;
        if tables < 2 {
            return Err(TrendError::Store(
                "Database not initialized. Run 'jobtrends init' first.".to_string(),
            ));
        }
        Ok(())
    }

    // --- Corpus maintenance ---

    /// Inserts postings, ignoring any whose id is already stored.
    pub fn import_postings(&self, postings: &[JobPosting]) -> Result<ImportStats> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut stats = ImportStats::default();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO job_postings (id, company, position, tags, date_posted)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for posting in postings {
                let tags = serde_json::to_string(&posting.tags)?;
                let changed = stmt.execute(params![
                    posting.id,
                    posting.company,
                    posting.position,
                    tags,
                    to_sql_timestamp(&posting.date_posted),
                ])?;
                if changed == 1 {
                    stats.inserted += 1;
                } else {
                    stats.skipped += 1;
                }
            }
        }
        tx.commit()?;
        info!(inserted = stats.inserted, skipped = stats.skipped, "imported postings");
        Ok(stats)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Result<CorpusStats> {
        let conn = self.conn()?;

        let total_jobs: i64 = conn.query_row("SELECT COUNT(*) FROM job_postings", [], |row| row.get(0))?;
        let total_companies: i64 =
            conn.query_row("SELECT COUNT(DISTINCT company) FROM job_postings", [], |row| row.get(0))?;

        let count_since = |hours: i64| -> Result<i64> {
            let cutoff = to_sql_timestamp(&(now - Duration::hours(hours)));
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM job_postings WHERE date_posted >= ?1",
                [cutoff],
                |row| row.get(0),
            )?)
        };
        let jobs_last_24h = count_since(24)?;
        let jobs_last_7d = count_since(24 * 7)?;

        let most_active_company: Option<String> = conn
            .query_row(
                "SELECT company FROM job_postings
                 WHERE company IS NOT NULL AND company <> ''
                 GROUP BY company
                 ORDER BY COUNT(*) DESC, company ASC
                 LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let most_demanded_skill: Option<String> = conn
            .query_row(
                "SELECT LOWER(TRIM(tag.value)) AS skill FROM job_postings,
                      json_each(CASE WHEN json_valid(job_postings.tags) THEN job_postings.tags ELSE '[]' END) AS tag
                 WHERE TRIM(tag.value) <> ''
                 GROUP BY skill
                 ORDER BY COUNT(*) DESC, skill ASC
                 LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(CorpusStats {
            total_jobs: total_jobs as usize,
            total_companies: total_companies as usize,
            jobs_last_24h: jobs_last_24h as usize,
            jobs_last_7d: jobs_last_7d as usize,
            most_active_company,
            most_demanded_skill,
        })
    }

    // --- Browsing ---

    /// Newest postings first. `company` is a case-insensitive substring match;
    /// `skill` must equal one of the posting's tags after normalization.
    pub fn list_postings(
        &self,
        company: Option<&str>,
        skill: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<JobPosting>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM job_postings
             WHERE (?1 IS NULL OR LOWER(company) LIKE '%' || LOWER(?1) || '%')
               AND (?2 IS NULL OR EXISTS (
                    SELECT 1 FROM json_each(CASE WHEN json_valid(tags) THEN tags ELSE '[]' END) AS tag
                    WHERE LOWER(TRIM(tag.value)) = LOWER(TRIM(?2))))
               AND (?3 IS NULL OR date_posted >= ?3)
             ORDER BY date_posted DESC, rowid DESC
             LIMIT ?4",
            POSTING_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![
                company,
                skill,
                since.as_ref().map(to_sql_timestamp),
                limit as i64
            ],
            Self::row_to_posting,
        )?;

        let mut postings = Vec::new();
        for row in rows {
            if let Some(posting) = row?.into_posting() {
                postings.push(posting);
            }
        }
        debug!(count = postings.len(), "listed postings");
        Ok(postings)
    }

    pub fn get_posting(&self, id: &str) -> Result<Option<JobPosting>> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM job_postings WHERE id = ?1", POSTING_COLUMNS),
                [id],
                Self::row_to_posting,
            )
            .optional()?;
        Ok(row.and_then(PostingRow::into_posting))
    }

    fn row_to_posting(row: &rusqlite::Row) -> rusqlite::Result<PostingRow> {
        Ok(PostingRow {
            id: row.get(0)?,
            company: row.get(1)?,
            position: row.get(2)?,
            tags: row.get(3)?,
            date_posted: row.get(4)?,
        })
    }

    fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<SnapshotRow> {
        Ok(SnapshotRow {
            analysis_date: row.get(0)?,
            window_days: row.get(1)?,
            trending_skills: row.get(2)?,
            trending_roles: row.get(3)?,
            total_jobs_analyzed: row.get(4)?,
            unique_skills_found: row.get(5)?,
            unique_companies: row.get(6)?,
            skill_clusters: row.get(7)?,
        })
    }
}

const POSTING_COLUMNS: &str = "id, company, position, tags, date_posted";

struct PostingRow {
    id: String,
    company: Option<String>,
    position: Option<String>,
    tags: Option<String>,
    date_posted: String,
}

impl PostingRow {
    /// Rows with an unparseable date are dropped; malformed tags become empty.
    fn into_posting(self) -> Option<JobPosting> {
        let Some(date_posted) = parse_sql_timestamp(&self.date_posted) else {
            warn!(posting = %self.id, date = %self.date_posted, "skipping posting with unparseable date");
            return None;
        };

        let tags = match self.tags.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|e| {
                warn!(posting = %self.id, error = %e, "ignoring malformed tags");
                Vec::new()
            }),
        };

        Some(JobPosting {
            id: self.id,
            position: self.position,
            tags,
            company: self.company,
            date_posted,
        })
    }
}

const SNAPSHOT_COLUMNS: &str = "analysis_date, analysis_window_days, trending_skills, trending_roles,
     total_jobs_analyzed, unique_skills_found, unique_companies, skill_clusters";

struct SnapshotRow {
    analysis_date: String,
    window_days: i64,
    trending_skills: String,
    trending_roles: String,
    total_jobs_analyzed: i64,
    unique_skills_found: i64,
    unique_companies: i64,
    skill_clusters: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<TrendAnalysisSnapshot> {
        let analysis_date = parse_sql_timestamp(&self.analysis_date).ok_or_else(|| {
            TrendError::Store(format!("invalid analysis_date '{}'", self.analysis_date))
        })?;
        Ok(TrendAnalysisSnapshot {
            analysis_date,
            window_days: self.window_days,
            trending_skills: serde_json::from_str(&self.trending_skills)?,
            trending_roles: serde_json::from_str(&self.trending_roles)?,
            total_jobs_analyzed: self.total_jobs_analyzed as usize,
            unique_skills_found: self.unique_skills_found as usize,
            unique_companies: self.unique_companies as usize,
            skill_clusters: serde_json::from_str(&self.skill_clusters)?,
        })
    }
}

impl CorpusAccessor for Database {
    fn fetch_postings(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<Vec<JobPosting>> {
        let conn = self.conn()?;
        // rowid order keeps insertion order, which downstream tie-breaking relies on
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM job_postings
             WHERE date_posted >= ?1 AND (?2 IS NULL OR date_posted < ?2)
             ORDER BY rowid",
            POSTING_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![to_sql_timestamp(&from), to.as_ref().map(to_sql_timestamp)],
            Self::row_to_posting,
        )?;

        let mut postings = Vec::new();
        for row in rows {
            if let Some(posting) = row?.into_posting() {
                postings.push(posting);
            }
        }
        Ok(postings)
    }

    fn count_distinct_companies(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(DISTINCT company) FROM job_postings
             WHERE date_posted >= ?1 AND (?2 IS NULL OR date_posted < ?2)",
            params![to_sql_timestamp(&from), to.as_ref().map(to_sql_timestamp)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl SnapshotStore for Database {
    fn save_snapshot(&self, snapshot: &TrendAnalysisSnapshot) -> Result<()> {
        let trending_skills = serde_json::to_string(&snapshot.trending_skills)?;
        let trending_roles = serde_json::to_string(&snapshot.trending_roles)?;
        let skill_clusters = serde_json::to_string(&snapshot.skill_clusters)?;

        self.conn()?.execute(
            "INSERT INTO trend_analyses (
                analysis_date, analysis_window_days, trending_skills, trending_roles,
                total_jobs_analyzed, unique_skills_found, unique_companies, skill_clusters
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                to_sql_timestamp(&snapshot.analysis_date),
                snapshot.window_days,
                trending_skills,
                trending_roles,
                snapshot.total_jobs_analyzed as i64,
                snapshot.unique_skills_found as i64,
                snapshot.unique_companies as i64,
                skill_clusters,
            ],
        )?;
        Ok(())
    }

    fn latest_snapshot(&self) -> Result<Option<TrendAnalysisSnapshot>> {
        let row = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM trend_analyses ORDER BY analysis_date DESC, id DESC LIMIT 1",
                    SNAPSHOT_COLUMNS
                ),
                [],
                Self::row_to_snapshot,
            )
            .optional()?;
        row.map(SnapshotRow::into_snapshot).transpose()
    }

    fn snapshots_since(&self, days_ago: i64, limit: usize) -> Result<Vec<TrendAnalysisSnapshot>> {
        let cutoff = to_sql_timestamp(&(Utc::now() - Duration::days(days_ago)));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM trend_analyses
             WHERE analysis_date >= ?1
             ORDER BY analysis_date DESC, id DESC
             LIMIT ?2",
            SNAPSHOT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![cutoff, limit as i64], Self::row_to_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }
}

// Fixed-width UTC timestamps so SQL string comparison matches time order.
fn to_sql_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_sql_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
