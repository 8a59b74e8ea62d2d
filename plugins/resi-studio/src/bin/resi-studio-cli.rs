//! Command-line front end for driving Resi Studio without a control surface.
//!
//! Usage:
//!   resi-studio-cli status                          - Show catalogs and tracked schedules
//!   resi-studio-cli go-live <encoder> <group>       - Start a live schedule
//!   resi-studio-cli stop-live <encoder> <group>     - Stop the schedule for that pair
//!   resi-studio-cli watch                           - Keep polling until Ctrl-C

use clap::{Parser, Subcommand};
use eyre::Context as _;
use resi_studio_control::config::DEFAULT_API_BASE_URL;
use resi_studio_control::feedbacks::all_destinations_started;
use resi_studio_control::{
    ApiSettings, ConfigStore, Connection, GoLiveOutcome, JsonFileConfigStore, PollSettings,
    Settings, StopLiveOutcome, TracingHost, background,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resi-studio-cli")]
#[command(about = "Start and stop Resi Studio live streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Module configuration file (credentials and tracked schedules)
    #[arg(long, env = "RESI_STUDIO_CONFIG", default_value = "resi-studio.json")]
    config: PathBuf,

    /// Overrides the client id stored in the configuration file
    #[arg(long, env = "RESI_STUDIO_CLIENT_ID")]
    client_id: Option<String>,

    /// Overrides the client secret stored in the configuration file
    #[arg(long, env = "RESI_STUDIO_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Resi Studio API base URL, including the version
    #[arg(long, env = "RESI_STUDIO_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Seconds between background polls
    #[arg(long, default_value_t = 60)]
    poll_interval: u64,

    /// Log request and response details
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show encoders, destination groups and tracked schedules
    Status,

    /// Start streaming an encoder to a destination group
    GoLive {
        encoder: String,
        destination_group: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Wait until every destination has started
        #[arg(long)]
        follow: bool,
    },

    /// Stop the schedule running for an encoder and destination group
    StopLive {
        encoder: String,
        destination_group: String,
    },

    /// Keep the schedules polled until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let store = Arc::new(JsonFileConfigStore::new(&cli.config));
    let mut config = store.load().context("load configuration")?;
    if let Some(client_id) = &cli.client_id {
        config.client_id.clone_from(client_id);
    }
    if let Some(client_secret) = &cli.client_secret {
        config.client_secret.clone_from(client_secret);
    }

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        config.log_level()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings {
        api: ApiSettings {
            base_url: cli.api_url.clone(),
            ..ApiSettings::default()
        },
        poll: PollSettings {
            slow_interval: Duration::from_secs(cli.poll_interval.max(1)),
            ..PollSettings::default()
        },
    };

    let connection = Connection::init(config, settings, Arc::new(TracingHost), store)
        .await
        .context("initialize connection")?;
    let result = run(&connection, cli.command).await;
    connection.destroy().await?;
    result
}

async fn run(connection: &Connection, command: Commands) -> eyre::Result<()> {
    let ctx = connection.context();
    match command {
        Commands::Status => {
            for schedule in ctx.schedules().snapshot().await {
                background::poll_schedule(ctx, &schedule.schedule_id).await;
            }

            println!("Encoders:");
            for choice in ctx.encoders().snapshot().await {
                println!("  {:<24} {}", choice.id, choice.label);
            }
            println!("Destination groups:");
            for choice in ctx.destination_groups().snapshot().await {
                println!("  {:<24} {}", choice.id, choice.label);
            }
            println!("Schedules:");
            for schedule in ctx.schedules().snapshot().await {
                println!(
                    "  {} (encoder {}, destination group {})",
                    schedule.schedule_id, schedule.encoder_id, schedule.destination_group_id
                );
                for d in schedule.destinations.unwrap_or_default() {
                    let status = format!("{:?}", d.status);
                    let kind = format!("{:?}", d.kind);
                    println!("    {status:<10} {kind:<10} {}", d.name);
                }
            }
            for error in ctx.encoder_errors().snapshot().await {
                println!("Encoder {} error: {}", error.encoder_id, error.message);
            }
        }
        Commands::GoLive {
            encoder,
            destination_group,
            title,
            description,
            follow,
        } => {
            match connection
                .go_live(&encoder, &destination_group, &title, &description)
                .await
            {
                GoLiveOutcome::Started { schedule_id } => println!("started schedule {schedule_id}"),
                GoLiveOutcome::StartedUntracked => {
                    println!("started, but the API did not return a schedule id")
                }
                GoLiveOutcome::AlreadyLive { schedule_id } => {
                    println!("already live as schedule {schedule_id}")
                }
                GoLiveOutcome::NotConnected(e) => {
                    return Err(e).context("not connected to Resi Studio");
                }
                GoLiveOutcome::Failed(e) => return Err(e).context("go live"),
            }

            if follow {
                let wait = async {
                    while !all_destinations_started(ctx, &encoder, &destination_group).await {
                        if ctx.schedules().find(&encoder, &destination_group).await.is_none() {
                            eyre::bail!("schedule ended before all destinations started");
                        }
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    Ok(())
                };
                tokio::select! {
                    r = wait => {
                        r?;
                        println!("all destinations started");
                    }
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
        }
        Commands::StopLive {
            encoder,
            destination_group,
        } => match connection.stop_live(&encoder, &destination_group).await {
            StopLiveOutcome::Stopped { schedule_id } => println!("stopped schedule {schedule_id}"),
            StopLiveOutcome::NoSchedule => {
                eyre::bail!("no schedule found for {encoder} / {destination_group}")
            }
            StopLiveOutcome::NotConnected(e) => {
                return Err(e).context("not connected to Resi Studio");
            }
            StopLiveOutcome::Failed(e) => return Err(e).context("stop live"),
        },
        Commands::Watch => {
            if !connection.is_polling() {
                eyre::bail!("not polling, check the connection status above");
            }
            tokio::signal::ctrl_c()
                .await
                .context("wait for Ctrl-C")?;
        }
    }
    Ok(())
}
