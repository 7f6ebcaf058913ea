//! The `nebula` binary: two long-running commands, `dispatcher run` and
//! `worker run` (spec §6). Configuration is layered defaults → optional
//! TOML file (`--config`) → environment → CLI flags, via `figment`;
//! logging is a `tracing-subscriber` fmt layer driven by `RUST_LOG`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use nebula_action::{register_builtin_nodes, NodeRegistry};
use nebula_dispatcher::Dispatcher;
use nebula_eventbus::EventBus;
use nebula_execution::InputCoordinator;
use nebula_receivers::{BusEmitter, CronSchedule, Receiver, SchedulerReceiver, WebhookReceiver, WebhookRoute};
use nebula_storage::PostgresStore;
use nebula_worker::Worker;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "nebula", version, about = "Nebula workflow engine control plane")]
struct Cli {
    /// Optional TOML file layered beneath environment variables and flags.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Matches trigger events to published workflows and fans out `WorkflowTriggered` events.
    Dispatcher {
        #[command(subcommand)]
        action: DispatcherCommand,
    },
    /// Drives published workflows to completion.
    Worker {
        #[command(subcommand)]
        action: WorkerCommand,
    },
}

#[derive(Subcommand)]
enum DispatcherCommand {
    Run(DispatcherRunArgs),
}

#[derive(Subcommand)]
enum WorkerCommand {
    Run(WorkerRunArgs),
}

#[derive(Args)]
struct DispatcherRunArgs {
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Connection string for the event bus. The only shipped transport is
    /// in-process (`nebula-eventbus`); this flag is accepted so a concrete
    /// broker can be plugged in behind the same trait without a CLI
    /// surface change, but it has no effect in this build.
    #[arg(long, env = "EVENT_BUS_URL")]
    event_bus: Option<String>,

    #[arg(long, env = "WEBHOOK_PORT")]
    webhook_port: Option<u16>,

    /// A webhook route as `<path>=<provider_id>`, e.g. `/hooks/github=github`.
    /// Repeatable. An HMAC secret for a route is read from
    /// `NEBULA_WEBHOOK_SECRET_<PROVIDER_ID>` (uppercased), if set.
    #[arg(long = "webhook-route")]
    webhook_routes: Vec<String>,

    /// A cron schedule as `<5-field expression>` or `<expression>@<IANA timezone>`.
    /// Repeatable.
    #[arg(long = "cron")]
    cron_schedules: Vec<String>,
}

#[derive(Args)]
struct WorkerRunArgs {
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// See `dispatcher run --event-bus`: accepted, currently a no-op.
    #[arg(long, env = "EVENT_BUS_URL")]
    event_bus: Option<String>,

    #[arg(long)]
    max_concurrent_nodes: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    event_bus: Option<String>,
    webhook_port: Option<u16>,
    max_concurrent_nodes: Option<usize>,
}

fn load_file_settings(config: Option<&PathBuf>) -> anyhow::Result<FileSettings> {
    let mut figment = Figment::new().merge(Serialized::defaults(FileSettings::default()));
    if let Some(path) = config {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("NEBULA_"));
    figment.extract().context("loading layered configuration")
}

fn required_database_url(cli: Option<String>, file: Option<String>) -> anyhow::Result<String> {
    cli.or(file)
        .context("--database-url is required (flag, DATABASE_URL / NEBULA_DATABASE_URL, or config file)")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let file_settings = load_file_settings(cli.config.as_ref())?;

    match cli.command {
        Command::Dispatcher { action: DispatcherCommand::Run(args) } => run_dispatcher(args, file_settings).await,
        Command::Worker { action: WorkerCommand::Run(args) } => run_worker(args, file_settings).await,
    }
}

async fn connect_store(database_url: &str) -> anyhow::Result<Arc<PostgresStore>> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connecting to the database")?;
    let store = Arc::new(PostgresStore::new(pool));
    store.migrate().await.context("running migrations")?;
    Ok(store)
}

fn warn_if_event_bus_set(event_bus: &Option<String>) {
    if let Some(url) = event_bus {
        tracing::warn!(
            event_bus = %url,
            "this build only ships the in-process event bus; --event-bus is accepted for forward \
             compatibility with a concrete broker but has no effect"
        );
    }
}

async fn run_dispatcher(args: DispatcherRunArgs, file: FileSettings) -> anyhow::Result<()> {
    let database_url = required_database_url(args.database_url, file.database_url)?;
    let event_bus = args.event_bus.or(file.event_bus);
    warn_if_event_bus_set(&event_bus);
    let webhook_port = args.webhook_port.or(file.webhook_port).unwrap_or(8080);
    let webhook_routes = parse_webhook_routes(&args.webhook_routes)?;
    let cron_schedules =
        args.cron_schedules.iter().map(|expr| parse_cron_schedule(expr)).collect::<anyhow::Result<Vec<_>>>()?;

    let store = connect_store(&database_url).await?;
    let bus = Arc::new(EventBus::default());
    // Register the dispatcher's consumer group eagerly so a receiver
    // publishing before `Dispatcher::run`'s first poll doesn't hit
    // `EventBusError::NoSubscribers`.
    bus.subscribe(nebula_eventbus::TRIGGER_TOPIC, "dispatcher");

    let cancellation = CancellationToken::new();
    let mut tasks = Vec::new();

    let dispatcher = Dispatcher::new(store.clone(), bus.clone());
    {
        let cancellation = cancellation.clone();
        tasks.push(tokio::spawn(async move { dispatcher.run(cancellation).await.map_err(anyhow::Error::from) }));
    }

    if !webhook_routes.is_empty() {
        let receiver = WebhookReceiver::new(webhook_port, webhook_routes);
        let emitter = Arc::new(BusEmitter::new(bus.clone()));
        let cancellation = cancellation.clone();
        tasks.push(tokio::spawn(async move {
            receiver.start(cancellation, emitter).await.map_err(anyhow::Error::from)
        }));
    }

    for schedule in cron_schedules {
        let receiver = SchedulerReceiver::new(schedule);
        let emitter = Arc::new(BusEmitter::new(bus.clone()));
        let cancellation = cancellation.clone();
        tasks.push(tokio::spawn(async move {
            receiver.start(cancellation, emitter).await.map_err(anyhow::Error::from)
        }));
    }

    tracing::info!(webhook_port, routes = args.webhook_routes.len(), crons = args.cron_schedules.len(), "dispatcher running");
    wait_for_shutdown(cancellation, tasks).await
}

async fn run_worker(args: WorkerRunArgs, file: FileSettings) -> anyhow::Result<()> {
    let database_url = required_database_url(args.database_url, file.database_url)?;
    let event_bus = args.event_bus.or(file.event_bus);
    warn_if_event_bus_set(&event_bus);
    let max_concurrent_nodes = args.max_concurrent_nodes.or(file.max_concurrent_nodes).unwrap_or(64);

    let store = connect_store(&database_url).await?;
    let bus = Arc::new(EventBus::default());

    let mut registry = NodeRegistry::new();
    register_builtin_nodes(&mut registry).context("registering builtin node types")?;

    let coordinator = Arc::new(InputCoordinator::new(store.clone()));
    let worker = Arc::new(Worker::new(
        Arc::new(registry),
        store.clone(),
        store.clone(),
        store.clone(),
        coordinator,
        bus,
        max_concurrent_nodes,
    ));

    let cancellation = CancellationToken::new();
    let run_cancellation = cancellation.clone();
    let run_worker = worker.clone();
    let task = tokio::spawn(async move { run_worker.run(run_cancellation).await.map_err(anyhow::Error::from) });

    tracing::info!(max_concurrent_nodes, "worker running");
    wait_for_shutdown(cancellation, vec![task]).await
}

async fn wait_for_shutdown(
    cancellation: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<anyhow::Result<()>>>,
) -> anyhow::Result<()> {
    signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received, draining in-flight work");
    cancellation.cancel();

    for task in tasks {
        task.await.context("task panicked")??;
    }
    Ok(())
}

fn parse_webhook_routes(raw: &[String]) -> anyhow::Result<Vec<WebhookRoute>> {
    raw.iter()
        .map(|entry| {
            let (path, provider_id) = entry
                .split_once('=')
                .with_context(|| format!("webhook route {entry:?} must be of the form <path>=<provider_id>"))?;
            if !path.starts_with('/') {
                bail!("webhook route path {path:?} must start with '/'");
            }
            let secret_var = format!("NEBULA_WEBHOOK_SECRET_{}", provider_id.to_uppercase());
            let hmac_secret = std::env::var(&secret_var).ok();
            Ok(WebhookRoute { path: path.to_string(), provider_id: provider_id.to_string(), hmac_secret })
        })
        .collect()
}

fn parse_cron_schedule(raw: &str) -> anyhow::Result<CronSchedule> {
    let (expression, timezone) = match raw.split_once('@') {
        Some((expr, tz)) => (expr, Some(tz)),
        None => (raw, None),
    };
    CronSchedule::parse(expression, timezone).map_err(|e| anyhow::anyhow!("invalid cron schedule {raw:?}: {e}"))
}
