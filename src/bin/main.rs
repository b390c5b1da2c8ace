use clap::{Parser, Subcommand};
use finance_tutor_client::{
    AiMode, AppState, ClientConfig, CsvFile, DashboardSummary, ExpenseRecord, ExplainAction,
    Explanation, InsightRecord, PersonaProfile, TutorClient,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tutor", about = "Command line front end for the finance tutor backend")]
struct Cli {
    /// Backend URL (overrides TUTOR_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the backend is reachable
    Health,
    /// Load the backend's sample data set
    Sample,
    /// Upload a CSV statement
    Upload { path: PathBuf },
    /// Re-read the dashboard for previously uploaded data
    Dashboard,
    /// Ask the tutor to explain one insight
    Explain {
        /// Upload this CSV first instead of loading sample data
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Position of the insight in the dashboard
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        follow_up: Option<String>,
        #[arg(long, default_value = "polite")]
        style: AiMode,
        #[arg(long, default_value = "explain")]
        action: ExplainAction,
    },
    /// Generate a spending persona
    Persona {
        /// Upload this CSV first instead of loading sample data
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    info!("📍 Backend: {}", config.base_url);

    let client = TutorClient::new(config)?;
    let state = Arc::clone(client.state());

    let _loading = state.loading().subscribe(|loading: &bool| {
        if *loading {
            eprintln!("⏳ Loading...");
        }
    });

    match cli.command {
        Command::Health => {
            let status = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Sample => {
            client.get_sample_data().await;
            ensure_no_error(&state)?;
            print_dashboard(&state);
        }
        Command::Upload { path } => {
            let file = CsvFile::from_path(&path).await?;
            client.upload_csv(file).await;
            ensure_no_error(&state)?;
            print_dashboard(&state);
        }
        Command::Dashboard => {
            client.refresh_dashboard().await;
            ensure_no_error(&state)?;
            print_dashboard(&state);
        }
        Command::Explain {
            csv,
            index,
            follow_up,
            style,
            action,
        } => {
            load_data(&client, csv).await?;

            let insights = state.insights().get();
            let Some(insight) = insights.get(index) else {
                return Err(format!(
                    "no insight at index {} ({} available)",
                    index,
                    insights.len()
                )
                .into());
            };

            let record = InsightRecord::view(insight);
            println!("\n=== INSIGHT ===");
            println!("[{}] {}", record.flag_level, record.message);

            let response = client
                .explain_insight(insight, follow_up.as_deref(), Some(style), Some(action))
                .await?;

            println!("\n=== TUTOR ({}, {}) ===", style, action);
            let explanation = Explanation::view(&response);
            if explanation.explanation.is_empty() {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", explanation.explanation);
                if !explanation.tip.is_empty() {
                    println!("\n💡 Tip: {}", explanation.tip);
                }
                if !explanation.next_step.is_empty() {
                    println!("→ Next step: {}", explanation.next_step);
                }
            }
        }
        Command::Persona { csv } => {
            load_data(&client, csv).await?;

            let persona = client.generate_persona().await?;
            state.set_persona(Some(persona));

            if let Some(persona) = state.persona().get() {
                let profile = PersonaProfile::view(&persona);
                println!("\n=== PERSONA ===");
                println!("{} {}", profile.emoji, profile.archetype);
                println!("{}", profile.description);
                if !profile.savage_quote.is_empty() {
                    println!("\n\"{}\"", profile.savage_quote);
                }
            }
        }
    }

    Ok(())
}

async fn load_data(client: &TutorClient, csv: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    match csv {
        Some(path) => client.upload_csv(CsvFile::from_path(&path).await?).await,
        None => client.get_sample_data().await,
    }
    ensure_no_error(client.state())
}

fn ensure_no_error(state: &AppState) -> Result<(), Box<dyn Error>> {
    match state.last_error().get() {
        Some(report) => Err(report.message.into()),
        None => Ok(()),
    }
}

fn print_dashboard(state: &AppState) {
    let Some(dashboard) = state.dashboard().get() else {
        println!("No dashboard loaded");
        return;
    };

    let DashboardSummary {
        total_expenses,
        expense_count,
        average_daily,
        confidence_score,
        ..
    } = dashboard.summary();

    println!("\n=== DASHBOARD ===");
    println!("Total spent:   {:.2}", total_expenses);
    println!("Transactions:  {}", expense_count);
    println!("Daily average: {:.2}", average_daily);
    println!("Health score:  {}/100", confidence_score);

    println!("\nExpenses:");
    state.expenses().with(|expenses| {
        for expense in expenses.iter().map(ExpenseRecord::view) {
            println!(
                "  {}  {:<30} {:>10.2}  {}",
                expense.date, expense.description, expense.amount, expense.category
            );
        }
    });

    println!("\nInsights:");
    state.insights().with(|insights| {
        for (i, insight) in insights.iter().map(InsightRecord::view).enumerate() {
            println!("  {}: [{}] {}", i, insight.flag_level, insight.message);
            if !insight.actionable_step.is_empty() {
                println!("     → {}", insight.actionable_step);
            }
        }
    });
}
