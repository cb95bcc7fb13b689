use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use azure_prs::azure::AzureDevOpsClient;
use azure_prs::badge::{sink_from_config, BadgeWriter};
use azure_prs::config::{AppConfig, LoggingConfig};
use azure_prs::pipeline::{Aggregator, CycleOutcome};
use azure_prs::server::{create_router, AppState};
use azure_prs::shutdown::{graceful_shutdown, wait_for_shutdown};
use azure_prs::store::{PreferenceStore, Preferences, PreferencesUpdate};
use azure_prs::view::{render_text, repository_checklist, DashboardView};

#[derive(Parser)]
#[command(name = "azure-prs", about = "Track open Azure DevOps pull requests")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll in the background and serve the dashboard over HTTP (default)
    Serve,
    /// Fetch once and print the open pull requests
    Status,
    /// List repositories, selected ones first
    Repos {
        /// Only show repositories whose name contains this text
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Add a repository to the selection, or remove it if already selected
    Toggle { repository_id: String },
    /// Show or change organization, project and board
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    Show,
    Set {
        #[arg(long)]
        organization: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        board: Option<String>,
    },
    /// Restore the configured defaults
    Reset,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Status => status(config).await,
        Command::Repos { search } => repos(config, &search).await,
        Command::Toggle { repository_id } => {
            let store = open_store(&config).await?;
            let selection = store.toggle(&repository_id).await?;
            let state = if selection.contains(&repository_id) {
                "selected"
            } else {
                "unselected"
            };
            println!("{repository_id} {state} ({} selected)", selection.len());
            Ok(())
        }
        Command::Prefs { action } => prefs(config, action).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        organization = %config.azure.organization,
        project = %config.azure.project_name,
        "Starting azure-prs"
    );

    let state = Arc::new(AppState::new(config.clone())?);

    // The poller idles until the persisted selection is known
    state.store.load().await?;

    let app = create_router(Arc::clone(&state));

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    graceful_shutdown(&state).await;

    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<PreferenceStore>> {
    let store = Arc::new(PreferenceStore::new(
        config.storage.path.clone(),
        Preferences::from_config(&config.azure),
    ));
    store.load().await?;
    Ok(store)
}

fn one_shot_aggregator(
    config: &AppConfig,
    store: Arc<PreferenceStore>,
) -> anyhow::Result<Aggregator> {
    let api = Arc::new(AzureDevOpsClient::new(&config.azure)?);
    let badge = BadgeWriter::new(sink_from_config(&config.badge), config.badge.debounce());
    Ok(Aggregator::new(api, store, badge))
}

async fn status(config: AppConfig) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let aggregator = one_shot_aggregator(&config, Arc::clone(&store))?;

    let (repositories, pull_requests) = tokio::join!(
        aggregator.refresh_repositories(),
        aggregator.refresh_pull_requests()
    );
    tracing::debug!(?repositories, ?pull_requests, "One-shot refresh finished");
    aggregator.badge().flush().await;

    let view = DashboardView::new(&aggregator.snapshot(), &store.get());
    print!("{}", render_text(&view));
    Ok(())
}

async fn repos(config: AppConfig, search: &str) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let aggregator = one_shot_aggregator(&config, Arc::clone(&store))?;

    if let CycleOutcome::Failed { .. } | CycleOutcome::Misconfigured =
        aggregator.refresh_repositories().await
    {
        let message = aggregator
            .snapshot()
            .error
            .map(|e| e.message)
            .unwrap_or_default();
        anyhow::bail!("Could not load repositories: {message}");
    }

    let snapshot = aggregator.snapshot();
    let rows = repository_checklist(&snapshot.repositories, search, &store.selection());
    if rows.is_empty() {
        println!("No repositories found.");
    }
    for row in rows {
        let mark = if row.selected { "[x]" } else { "[ ]" };
        let disabled = if row.disabled { " (disabled)" } else { "" };
        println!("{mark} {}{disabled}  {}", row.name, row.id);
    }
    Ok(())
}

async fn prefs(config: AppConfig, action: PrefsAction) -> anyhow::Result<()> {
    let store = open_store(&config).await?;

    let prefs = match action {
        PrefsAction::Show => store.get(),
        PrefsAction::Set {
            organization,
            project,
            board,
        } => {
            let update = PreferencesUpdate {
                organization,
                project_name: project,
                board_name: board,
            };
            store.set(update).await?
        }
        PrefsAction::Reset => store.reset().await?,
    };

    println!("organization: {}", prefs.organization);
    println!("project:      {}", prefs.project_name);
    println!("board:        {}", prefs.board_name);
    Ok(())
}
