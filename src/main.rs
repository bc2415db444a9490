use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use review_store::{
    render_report, Config, GeminiAnalyzer, Intake, ReviewFilter, ReviewStore, StorageBackend,
};

#[derive(Parser)]
#[command(name = "review-store")]
#[command(about = "Collect reviews with AI-generated replies and inspect them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = ".review-store/config.yml")]
    config: PathBuf,

    /// Token for the remote document backend
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a review and print the AI reply
    Submit {
        /// Star rating
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=5))]
        rating: i64,

        /// Review text
        #[arg(long)]
        review: String,

        /// API key for the generative-language API
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        gemini_api_key: Option<String>,
    },

    /// List stored reviews
    List {
        /// Only show reviews with this rating
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=5))]
        rating: Option<i64>,

        /// Case-insensitive search over review text and AI summary
        #[arg(long)]
        search: Option<String>,

        /// Include AI summary, recommended action and reply
        #[arg(long)]
        ai: bool,
    },

    /// Show review analytics
    Stats,

    /// Export all reviews
    Export {
        /// Write CSV to this path
        #[arg(long, required_unless_present = "json")]
        csv: Option<PathBuf>,

        /// Write JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("review_store=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let backend = StorageBackend::from_config(&config.storage, cli.github_token)?;
    let store = ReviewStore::new(backend).with_recent_window(config.analytics.recent_window);

    match cli.command {
        Commands::Submit {
            rating,
            review,
            gemini_api_key,
        } => {
            let analyzer = GeminiAnalyzer::from_config(&config.analyzer, gemini_api_key)?;
            submit(Intake::new(analyzer, store), rating, &review).await?;
        }
        Commands::List { rating, search, ai } => {
            list(&store, ReviewFilter { rating, search }, ai).await;
        }
        Commands::Stats => {
            println!("{}", render_report(&store.aggregate().await));
        }
        Commands::Export { csv, json } => {
            export(&store, csv, json).await?;
        }
    }

    Ok(())
}

async fn submit(
    intake: Intake<GeminiAnalyzer, StorageBackend>,
    rating: i64,
    review: &str,
) -> Result<()> {
    let submission = intake.submit(rating, review).await?;

    if !submission.saved {
        anyhow::bail!("Failed to save review. Please try again.");
    }

    println!("Review submitted successfully!\n");
    println!("AI Response:\n  {}\n", submission.insights.response);
    println!("Summary:\n  {}\n", submission.insights.summary);
    println!(
        "Recommended Action:\n  {}",
        submission.insights.recommended_action
    );

    Ok(())
}

async fn list(store: &ReviewStore<StorageBackend>, filter: ReviewFilter, show_ai: bool) {
    let (reviews, total) = store.list_with_total(&filter).await;
    if total == 0 {
        println!("No reviews found.");
        return;
    }

    println!("Showing {} of {} reviews\n", reviews.len(), total);

    for review in reviews {
        let date: String = review.timestamp.chars().take(10).collect();
        let stars = usize::try_from(review.user_rating.clamp(0, 5)).unwrap_or(0);
        println!("{:<5} {}", "*".repeat(stars), date);
        println!("  Review: {}", review.user_review);

        if show_ai {
            println!("  AI Summary: {}", review.ai_summary);
            println!("  Recommended Action: {}", review.ai_recommended_action);
            println!("  AI Response: {}", review.ai_response);
        }

        println!();
    }
}

async fn export(
    store: &ReviewStore<StorageBackend>,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = csv {
        if !store.export_delimited(&path).await {
            anyhow::bail!("CSV export to {} failed", path.display());
        }
        info!(path = %path.display(), "CSV export written");
        println!("Exported CSV to {}", path.display());
    }

    if let Some(path) = json {
        if !store.export_json(&path).await {
            anyhow::bail!("JSON export to {} failed", path.display());
        }
        info!(path = %path.display(), "JSON export written");
        println!("Exported JSON to {}", path.display());
    }

    Ok(())
}
