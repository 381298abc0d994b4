use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use inquire::{Select, Text};
use std::{sync::Arc, time::Duration};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};
use watchface_core::{
    Config, InMemoryWeatherSource, LocalTransport, ProducerService, ScreenShape,
    SnapshotProducer, Trigger, Units, WatchFaceEngine, WatchFaceEvent, WeatherRow,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "watchface", version, about = "Watch-face weather relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// A weather row given on the command line, temperatures in Celsius.
#[derive(Debug, Clone, Copy, Args)]
pub struct RowArgs {
    /// OpenWeatherMap condition code, e.g. 800 for clear sky.
    #[arg(long, default_value_t = 800)]
    pub condition: i32,

    /// Today's high.
    #[arg(long, allow_hyphen_values = true)]
    pub max: f64,

    /// Today's low.
    #[arg(long, allow_hyphen_values = true)]
    pub min: f64,
}

impl From<RowArgs> for WeatherRow {
    fn from(args: RowArgs) -> Self {
        WeatherRow { condition_code: args.condition, max_temp: args.max, min_temp: args.min }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the preferred location and temperature units.
    Configure,

    /// Print the payload the phone would push for a weather row.
    Payload {
        #[command(flatten)]
        row: RowArgs,
    },

    /// Run phone and watch in-process and print every repainted frame.
    Demo {
        #[command(flatten)]
        row: RowArgs,

        /// How long to run; ambient mode starts half way through.
        #[arg(long, default_value_t = 6)]
        seconds: u64,

        /// Lay the face out for a round screen.
        #[arg(long)]
        round: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Payload { row } => payload(&config, row.into()).await,
            Command::Demo { row, seconds, round } => {
                let shape = if round { ScreenShape::Round } else { ScreenShape::Square };
                demo(&config, row.into(), Duration::from_secs(seconds.max(1)), shape).await
            }
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let location = Text::new("Preferred location:")
        .with_default(config.location())
        .prompt()
        .context("Failed to read location")?;

    let options = Units::all().to_vec();
    let cursor = options.iter().position(|u| *u == config.units).unwrap_or(0);
    let units = Select::new("Temperature units:", options)
        .with_starting_cursor(cursor)
        .prompt()
        .context("Failed to read units")?;

    config.set_location(location.trim());
    config.units = units;
    config.save()?;
    debug!(location = %config.location(), units = %config.units, "configuration updated");

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Seed an in-memory store with today's row for the configured location.
async fn seeded_source(config: &Config, row: WeatherRow) -> Arc<InMemoryWeatherSource> {
    let source = Arc::new(InMemoryWeatherSource::new());
    source.upsert(config.location(), chrono::Local::now().date_naive(), row).await;
    source
}

async fn payload(config: &Config, row: WeatherRow) -> anyhow::Result<()> {
    let source = seeded_source(config, row).await;
    let producer = SnapshotProducer::new(config, source, Arc::new(LocalTransport::new()));

    let snapshot = producer
        .build_snapshot()
        .await
        .context("No weather row for today at the configured location")?;

    let json = serde_json::to_string_pretty(&snapshot.to_data_map())
        .context("Failed to serialize payload")?;
    println!("{}\n{json}", config.watchface.snapshot_path);
    Ok(())
}

async fn demo(
    config: &Config,
    row: WeatherRow,
    run_for: Duration,
    shape: ScreenShape,
) -> anyhow::Result<()> {
    info!(?shape, seconds = run_for.as_secs(), location = %config.location(), "starting demo");
    let transport = Arc::new(LocalTransport::new());

    let (engine, inbox) = WatchFaceEngine::new(config, transport.clone());
    let watch = engine.spawn(inbox);
    let mut frames = watch.frames();

    watch.send(WatchFaceEvent::WindowInsets(shape));
    watch.send(WatchFaceEvent::VisibilityChanged(true));

    // The watch listener is registered by the time the first frame is drawn.
    frames.changed().await.context("Watch face stopped before drawing")?;
    println!("{}", *frames.borrow_and_update());

    let source = seeded_source(config, row).await;
    let phone = ProducerService::spawn(SnapshotProducer::new(config, source, transport.clone()));
    phone.trigger(Trigger::update_watchface());

    let start = Instant::now();
    let ambient_at = start + run_for / 2;
    let deadline = start + run_for;
    let mut ambient = false;

    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *frames.borrow_and_update());
            }
            _ = sleep_until(ambient_at), if !ambient => {
                ambient = true;
                info!("switching watch face to ambient mode");
                watch.send(WatchFaceEvent::AmbientModeChanged(true));
            }
            _ = sleep_until(deadline) => break,
        }
    }

    phone.shutdown().await;
    let state = watch.destroy().await.context("Watch face task failed")?;

    println!(
        "pushed {} snapshot(s); watch shows max {:?}, min {:?}",
        transport.accepted_writes(),
        state.temp_max().unwrap_or("-"),
        state.temp_min().unwrap_or("-"),
    );
    Ok(())
}
