use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use esi_client::EsiClient;
use incursion_watch::{
    config::{load_config, AppConfig},
    keepalive,
    notify::{GuildBroadcast, NotifyBackend, NotifyRouter},
    telemetry, EntityCache, IncursionWatch, KvStore, MemoryStore, PostgresStore, Renderer,
    Scheduler, SnapshotService, TimedStore,
};

#[derive(Parser)]
#[command(name = "incursion-watch")]
#[command(about = "Watches EVE incursions and broadcasts changes")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "incursion-watch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until the process is stopped (default)
    Run,
    /// Print the current null/low sec incursions and exit
    List,
    /// Print Tranquility server status and exit
    Status,
    /// Manage the guilds that receive broadcasts
    Guild {
        #[command(subcommand)]
        action: GuildAction,
    },
}

#[derive(Subcommand)]
enum GuildAction {
    /// Register a guild and set its broadcast channel webhook
    Add { guild_id: String, webhook_url: String },
    /// Stop broadcasting to a guild
    Remove { guild_id: String },
    /// Show registered guilds and their channels
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing()?;
    telemetry::install_panic_hook();

    info!("Incursion watch starting...");

    let config = AppConfig::from_env()?;
    let file_config = load_config(&cli.config)?;

    let esi = Arc::new(EsiClient::new(
        config.esi_base_url.clone(),
        Some(config.esi_timeout),
    )?);

    let command = cli.command.unwrap_or(Commands::Run);
    if let Commands::Status = &command {
        report_status(&esi).await;
        return Ok(());
    }

    let (store, durable) = open_store(&config).await?;

    if let Commands::Guild { action } = &command {
        if !durable {
            warn!("Guild registry changes will be lost without DATABASE_URL");
        }
        return manage_guilds(GuildBroadcast::new(store), action).await;
    }

    let cache = Arc::new(EntityCache::new(esi.clone(), store.clone()));
    let snapshots = SnapshotService::new(
        esi.clone(),
        cache,
        store.clone(),
        file_config.watch.default_staging_system_id,
    )
    .with_staleness(chrono::Duration::seconds(file_config.watch.staleness_secs));
    let renderer = Renderer::new(file_config.watch.security_status_threshold);

    let notifier: Arc<dyn NotifyBackend> = Arc::new(NotifyRouter::build(
        config.slack_webhook_url.clone(),
        durable.then(|| store.clone()),
    ));
    let watch = Arc::new(IncursionWatch::new(snapshots, renderer, notifier));

    if let Commands::List = &command {
        println!("{}", watch.listing().await);
        return Ok(());
    }

    report_status(&esi).await;

    let restored = watch.restore().await;
    info!(restored, "Incursion watch ready");

    let sched = &file_config.scheduler;
    let mut scheduler = Scheduler::new(Duration::from_secs(sched.resolution_secs));

    let check = Arc::clone(&watch);
    scheduler.schedule(
        "IncursionChecker",
        move || {
            let watch = Arc::clone(&check);
            async move { watch.check().await }
        },
        Duration::from_secs(sched.check_interval_secs),
    );

    if let Some(url) = config.hosted_url.clone() {
        let http = reqwest::Client::new();
        scheduler.schedule(
            "KeepAlive",
            move || {
                let http = http.clone();
                let url = url.clone();
                async move { keepalive::ping(&http, &url).await }
            },
            Duration::from_secs(sched.keepalive_interval_secs),
        );
    }

    scheduler.run().await;
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store.
/// The flag reports whether the store survives a restart.
async fn open_store(config: &AppConfig) -> Result<(Arc<dyn KvStore>, bool)> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.store_timeout).await?;
            store.migrate().await?;
            info!("Connected to Postgres store");
            Ok((Arc::new(TimedStore::new(store, config.store_timeout)), true))
        }
        None => {
            warn!("No DATABASE_URL set, using in-memory store; cache and settings will not survive a restart");
            Ok((
                Arc::new(TimedStore::new(MemoryStore::new(), config.store_timeout)),
                false,
            ))
        }
    }
}

async fn manage_guilds(guilds: GuildBroadcast, action: &GuildAction) -> Result<()> {
    match action {
        GuildAction::Add {
            guild_id,
            webhook_url,
        } => {
            guilds.register_guild(guild_id).await?;
            guilds.set_broadcast_channel(guild_id, webhook_url).await?;
            info!(guild = %guild_id, "Guild registered");
        }
        GuildAction::Remove { guild_id } => {
            guilds.remove_guild(guild_id).await?;
            info!(guild = %guild_id, "Guild removed");
        }
        GuildAction::List => {
            let mut ids: Vec<String> = guilds.guilds().await?.into_iter().collect();
            ids.sort();
            for id in ids {
                let channel = guilds.broadcast_channel(&id).await?;
                println!("{id}\t{}", channel.as_deref().unwrap_or("<no channel>"));
            }
        }
    }
    Ok(())
}

async fn report_status(esi: &EsiClient) {
    match esi.status().await {
        Ok(status) => info!(
            players = status.players,
            server_version = %status.server_version,
            "Tranquility is online"
        ),
        Err(e) => warn!(error = %e, "Tranquility is offline"),
    }
}
