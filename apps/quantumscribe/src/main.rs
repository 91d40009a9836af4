use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use client_core::{
    supabase::{SupabaseAuth, SupabaseConfig, SupabaseTable},
    GatePhase, LoginForm, Navigator, ProjectListController, RouteTracker, SessionGate,
    SessionView,
};
use shared::{domain::Project, protocol::Route};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(name = "quantumscribe", about = "Manage QuantumScribe projects")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    supabase_url: Option<String>,
    #[arg(long)]
    anon_key: Option<String>,
    #[arg(long)]
    email: String,
    #[arg(long, env = "QUANTUMSCRIBE_PASSWORD", hide_env_values = true)]
    password: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List projects, newest first.
    List,
    /// Create a project, then list.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

struct TerminalNavigator;

#[async_trait]
impl Navigator for TerminalNavigator {
    async fn go_to(&self, route: Route) {
        info!(route = route.path(), "navigate");
        println!("-> {}", route.path());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(&cli.config);
    if let Some(url) = cli.supabase_url {
        settings.supabase_url = url;
    }
    if let Some(key) = cli.anon_key {
        settings.supabase_anon_key = key;
    }
    let url = config::normalize_base_url(&settings.supabase_url)?;
    if settings.supabase_anon_key.trim().is_empty() {
        bail!("missing supabase anon key; set SUPABASE_ANON_KEY or pass --anon-key");
    }
    let supabase = SupabaseConfig::new(url, settings.supabase_anon_key);

    let auth = SupabaseAuth::new(supabase.clone());
    let navigator = Arc::new(RouteTracker::new(Arc::new(TerminalNavigator)));
    let gate = SessionGate::mount(auth.clone(), navigator.clone()).await;

    let login = LoginForm::new(auth.clone(), navigator.clone());
    login.set_email(cli.email).await;
    login.set_password(cli.password).await;
    if let Err(err) = login.submit().await {
        gate.teardown().await;
        return Err(anyhow!("sign in failed: {err}"));
    }
    wait_for_phase(&gate, GatePhase::Authenticated).await;
    if let SessionView::SignedIn { email: Some(email) } = gate.session_view().await {
        println!("signed in as {email}");
    }

    let table = Arc::new(SupabaseTable::new(
        supabase,
        settings.projects_table,
        auth.clone(),
    ));
    let projects = ProjectListController::mount(table).await;
    let outcome = run_command(&projects, cli.command).await;
    projects.close().await;

    gate.sign_out().await;
    wait_for_phase(&gate, GatePhase::Unauthenticated).await;
    gate.teardown().await;
    outcome
}

async fn run_command(projects: &ProjectListController, command: Command) -> Result<()> {
    if let Command::Create { name, description } = command {
        projects.set_pending_name(name).await;
        projects.set_pending_description(description).await;
        let created = projects.submit_pending().await?;
        println!("created project {}", created.id);
    }

    let snapshot = projects.snapshot().await;
    if let Some(err) = snapshot.last_error {
        bail!("{err}");
    }
    render(&snapshot.records);
    Ok(())
}

fn render(records: &[Project]) {
    if records.is_empty() {
        println!("No projects found. Create your first project!");
        return;
    }
    for project in records {
        println!(
            "{} ({})",
            project.name,
            project.created_at.format("%Y-%m-%d")
        );
        if !project.description.is_empty() {
            println!("    {}", project.description);
        }
    }
}

async fn wait_for_phase(gate: &SessionGate, phase: GatePhase) {
    let settled = tokio::time::timeout(Duration::from_secs(2), async {
        while gate.phase().await != phase {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if settled.is_err() {
        warn!(?phase, "session gate did not settle");
    }
}
