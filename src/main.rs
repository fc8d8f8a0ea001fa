use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use jobtrends::trends::normalize_role;
use jobtrends::trends::roles::MAX_TRENDING_ROLES;
use jobtrends::trends::skills::MAX_TRENDING_SKILLS;
use jobtrends::{Config, Database, JobPosting, TrendAnalysisSnapshot, TrendAnalyzer};

/// Upper bound for `jobs --days`; keeps the cutoff inside chrono's range.
const MAX_LOOKBACK_DAYS: i64 = 36_500;

#[derive(Parser)]
#[command(name = "jobtrends")]
#[command(about = "Skill and role trend analysis over a job posting corpus")]
struct Cli {
    /// Database path (overrides JOBTRENDS_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Analysis window in days, 7-365 (overrides JOBTRENDS_WINDOW_DAYS)
    #[arg(short, long, global = true)]
    window: Option<i64>,

    /// Analysis timeout in seconds (overrides JOBTRENDS_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Import job postings from a JSON array file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// List stored job postings, newest first
    Jobs {
        /// Filter by company (substring, case-insensitive)
        #[arg(short, long)]
        company: Option<String>,

        /// Filter by skill tag
        #[arg(short, long)]
        skill: Option<String>,

        /// Only postings from the last N days
        #[arg(short, long)]
        days: Option<i64>,

        /// Maximum results
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show posting details
    Show {
        /// Posting ID
        id: String,
    },

    /// Show trending skills
    Skills {
        /// Number of skills to show
        #[arg(short, long, default_value = "20")]
        top: usize,
    },

    /// Show trending roles
    Roles {
        /// Number of roles to show
        #[arg(short, long, default_value = "15")]
        top: usize,
    },

    /// Show skills that often appear together
    Clusters,

    /// Run a full analysis and store a snapshot
    Analyze,

    /// Show the latest stored analysis
    Latest {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored analyses
    History {
        /// Number of days to look back (7-365)
        #[arg(short, long, default_value = "30")]
        days: i64,

        /// Maximum results (1-50)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Corpus overview
    Stats,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env();
    if let Some(path) = &cli.db {
        config = config.with_database_path(path.clone());
    }
    if let Some(days) = cli.window {
        config = config.with_window_days(days)?;
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs.max(1)));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let db = Arc::new(
        Database::open(&config.database_path)
            .with_context(|| format!("Failed to open database at {}", config.database_path.display()))?,
    );

    if !matches!(cli.command, Commands::Init) {
        db.ensure_initialized()?;
    }

    let analyzer = TrendAnalyzer::new(Arc::clone(&db), &config);
    let window_days = config.window_days;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read postings file: {}", file.display()))?;
            let postings: Vec<JobPosting> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse postings from {}", file.display()))?;
            let stats = db.import_postings(&postings)?;
            println!("Imported {} posting(s), skipped {} duplicate(s).", stats.inserted, stats.skipped);
        }

        Commands::Jobs {
            company,
            skill,
            days,
            limit,
        } => {
            let since = match days {
                Some(d) if d < 1 => return Err(anyhow!("--days must be at least 1")),
                Some(d) => Some(Utc::now() - chrono::Duration::days(d.min(MAX_LOOKBACK_DAYS))),
                None => None,
            };
            let postings = db.list_postings(company.as_deref(), skill.as_deref(), since, limit)?;
            if postings.is_empty() {
                println!("No postings found.");
            } else {
                println!("{:<14} {:<20} {:<30} {:<11} {}", "ID", "COMPANY", "POSITION", "POSTED", "TAGS");
                println!("{}", "-".repeat(100));
                for posting in postings {
                    println!(
                        "{:<14} {:<20} {:<30} {:<11} {}",
                        truncate(&posting.id, 12),
                        truncate(posting.company.as_deref().unwrap_or("-"), 18),
                        truncate(posting.position.as_deref().unwrap_or("-"), 28),
                        posting.date_posted.format("%Y-%m-%d"),
                        truncate(&posting.tags.join(", "), 30)
                    );
                }
            }
        }

        Commands::Show { id } => match db.get_posting(&id)? {
            Some(posting) => {
                println!("ID:       {}", posting.id);
                println!("Company:  {}", posting.company.as_deref().unwrap_or("-"));
                println!("Position: {}", posting.position.as_deref().unwrap_or("-"));
                println!("Role:     {}", normalize_role(posting.position.as_deref()));
                println!("Posted:   {}", posting.date_posted.format("%Y-%m-%d %H:%M:%S UTC"));
                if posting.tags.is_empty() {
                    println!("Tags:     -");
                } else {
                    println!("Tags:     {}", posting.tags.join(", "));
                }
            }
            None => {
                println!("Posting not found: {}", id);
            }
        },

        Commands::Skills { top } => {
            let skills = analyzer.analyze_skill_trends(window_days)?;
            if skills.is_empty() {
                println!("No skill mentions in the last {} days.", window_days);
            } else {
                println!("Trending skills, {}-day window", window_days);
                println!("{:<5} {:<24} {:>9} {:>9} {:>10}", "RANK", "SKILL", "CURRENT", "PREVIOUS", "GROWTH");
                println!("{}", "-".repeat(61));
                for (i, skill) in skills.iter().take(top.min(MAX_TRENDING_SKILLS)).enumerate() {
                    println!(
                        "{:<5} {:<24} {:>9} {:>9} {:>10}",
                        i + 1,
                        truncate(&skill.skill_name, 22),
                        skill.current_mentions,
                        skill.previous_mentions,
                        skill.growth_percentage
                    );
                }
            }
        }

        Commands::Roles { top } => {
            let roles = analyzer.analyze_role_trends(window_days)?;
            if roles.is_empty() {
                println!("No postings in the last {} days.", window_days);
            } else {
                println!("Trending roles, {}-day window", window_days);
                println!("{:<12} {:>6} {:>10}  {}", "ROLE", "JOBS", "GROWTH", "TOP SKILLS");
                println!("{}", "-".repeat(72));
                for role in roles.iter().take(top.min(MAX_TRENDING_ROLES)) {
                    println!(
                        "{:<12} {:>6} {:>10.2}  {}",
                        role.role_name,
                        role.job_count,
                        role.growth_rate,
                        role.top_skills.join(", ")
                    );
                }
            }
        }

        Commands::Clusters => {
            let clusters = analyzer.identify_clusters(window_days)?;
            println!("Skill clusters, {}-day window", window_days);
            for (anchor, related) in &clusters {
                if related.is_empty() {
                    println!("  {:<12} -", anchor);
                } else {
                    println!("  {:<12} {}", anchor, related.join(", "));
                }
            }
        }

        Commands::Analyze => {
            println!("Running trend analysis over the last {} days...", window_days);
            let summary = analyzer.run_full_analysis(window_days).await?;
            println!("\nResults:");
            println!("  Jobs analyzed:   {}", summary.total_jobs_analyzed);
            println!("  Trending skills: {}", summary.trending_skills_count);
            println!("  Trending roles:  {}", summary.trending_roles_count);
        }

        Commands::Latest { json } => match analyzer.latest_snapshot()? {
            Some(snapshot) if json => {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Some(snapshot) => print_snapshot(&snapshot),
            None => {
                println!("No trend analysis available. Run analysis first.");
            }
        },

        Commands::History { days, limit } => {
            let snapshots = analyzer.snapshot_history(days, limit)?;
            if snapshots.is_empty() {
                println!("No analyses in the last {} days.", days);
            } else {
                println!("{:<22} {:>7} {:>7} {:>8} {:>7} {:>10}", "DATE", "WINDOW", "JOBS", "SKILLS", "ROLES", "COMPANIES");
                println!("{}", "-".repeat(66));
                for snapshot in snapshots {
                    println!(
                        "{:<22} {:>7} {:>7} {:>8} {:>7} {:>10}",
                        snapshot.analysis_date.format("%Y-%m-%d %H:%M:%S"),
                        snapshot.window_days,
                        snapshot.total_jobs_analyzed,
                        snapshot.unique_skills_found,
                        snapshot.trending_roles.len(),
                        snapshot.unique_companies
                    );
                }
            }
        }

        Commands::Stats => {
            let stats = db.stats(Utc::now())?;
            println!("Total jobs:          {}", stats.total_jobs);
            println!("Total companies:     {}", stats.total_companies);
            println!("Jobs last 24h:       {}", stats.jobs_last_24h);
            println!("Jobs last 7d:        {}", stats.jobs_last_7d);
            println!(
                "Most active company: {}",
                stats.most_active_company.as_deref().unwrap_or("-")
            );
            println!(
                "Most demanded skill: {}",
                stats.most_demanded_skill.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &TrendAnalysisSnapshot) {
    println!("Analysis from {}", snapshot.analysis_date.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Window:          {} days", snapshot.window_days);
    println!("Jobs analyzed:   {}", snapshot.total_jobs_analyzed);
    println!("Unique skills:   {}", snapshot.unique_skills_found);
    println!("Companies:       {}", snapshot.unique_companies);

    if !snapshot.trending_skills.is_empty() {
        println!("\n--- Skills ---");
        for skill in snapshot.trending_skills.iter().take(10) {
            println!("  {:<24} {:>10}", truncate(&skill.skill_name, 22), skill.growth_percentage);
        }
    }

    if !snapshot.trending_roles.is_empty() {
        println!("\n--- Roles ---");
        for role in &snapshot.trending_roles {
            println!("  {:<12} {:>6} jobs", role.role_name, role.job_count);
        }
    }

    let clusters: Vec<_> = snapshot
        .skill_clusters
        .iter()
        .filter(|(_, related)| !related.is_empty())
        .collect();
    if !clusters.is_empty() {
        println!("\n--- Clusters ---");
        for (anchor, related) in clusters {
            println!("  {:<12} {}", anchor, related.join(", "));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
