use anyhow::{Context, Result};
use clap::Parser;
use smart_home_bci::config::HomeConfig;
use smart_home_bci::device::{ConsoleDecoder, EegWindow};
use smart_home_bci::dispatch::{Dispatcher, HomeContext};
use smart_home_bci::storage::{PreferenceStore, SqlitePreferenceStore};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Dispatch decoded brain-signal and voice commands to the smart home
#[derive(Parser, Debug)]
#[command(name = "smart-home-bci", version, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preference database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Health classifier weights (JSON)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// EEG samples (whitespace-separated) used for health monitoring
    #[arg(long)]
    eeg: Option<PathBuf>,

    /// Home hub address
    #[arg(long)]
    hub: Option<IpAddr>,

    /// Lighting bridge address
    #[arg(long)]
    bridge: Option<IpAddr>,

    /// Record silence instead of opening the microphone
    #[arg(long, default_value_t = false)]
    no_audio: bool,

    /// Print stored preferences and exit
    #[arg(long, default_value_t = false)]
    list_preferences: bool,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "smart_home_bci=trace,debug"
    } else {
        "smart_home_bci=debug,info"
    };

    // Logs go to stderr; stdout carries the spoken replies
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = build_config(&args)?;

    if args.list_preferences {
        let store = SqlitePreferenceStore::open(&config.storage.preferences_db)?;
        for preference in store.all()? {
            println!("{}\t{}", preference.name, preference.value);
        }
        return Ok(());
    }

    info!("Starting smart home dispatcher");

    let mut decoder = ConsoleDecoder::stdio();
    if let Some(path) = &config.signal.eeg_path {
        let window = EegWindow::load(path, config.signal.sample_rate)
            .context("Failed to load EEG samples")?;
        decoder = decoder.with_eeg_window(window);
    }

    let decoder = Box::new(decoder);
    let ctx = HomeContext::from_config(&config, decoder)
        .context("Failed to initialize home collaborators")?;

    let mut dispatcher = Dispatcher::new(ctx);
    dispatcher.run().context("Dispatch loop terminated")?;

    drop(dispatcher);
    info!("Preference database closed");

    Ok(())
}

fn build_config(args: &Args) -> Result<HomeConfig> {
    let mut config = HomeConfig::resolve(args.config.as_deref())?;

    if let Some(db) = &args.db {
        config = config.with_preferences_db(db);
    }
    if let Some(weights) = &args.weights {
        config = config.with_classifier_weights(weights);
    }
    if let Some(eeg) = &args.eeg {
        config = config.with_eeg_file(eeg);
    }
    if let Some(hub) = args.hub {
        config = config.with_hub(hub);
    }
    if let Some(bridge) = args.bridge {
        config = config.with_bridge(bridge);
    }
    if args.no_audio {
        config = config.without_audio_input();
    }

    Ok(config)
}
