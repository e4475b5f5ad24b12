//! CLI entry point for CityStamp: stamp geofenced photos and collect visits.

mod display;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose};
use chrono::Local;
use citystamp_client::{ApiClient, ApiConfig};
use citystamp_core::{Coordinate, Zone};
use citystamp_image::{StampPipeline, load_font};
use citystamp_session::{
    CaptureSession, LocationError, LocationProvider, LocationTracker, SubmitOutcome,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "citystamp", version, about = "Geofenced photo stamps and visit collection")]
struct Cli {
    /// Base URL of the collector backend.
    #[arg(long, env = "CITYSTAMP_API_URL")]
    api_url: String,

    /// Per-session REST nonce for authenticated calls.
    #[arg(long, env = "CITYSTAMP_NONCE", default_value = "")]
    nonce: String,

    /// TrueType font used for stamp captions.
    #[arg(
        long,
        env = "CITYSTAMP_FONT",
        default_value = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
    )]
    font: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the zone catalog.
    Zones,
    /// List the zones already collected by the current user.
    Visits,
    /// Stamp a photo against the catalog without submitting.
    Stamp {
        photo: PathBuf,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lng: Option<f64>,
        /// Output path for the stamped JPEG.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Stamp a photo and record the visit when the zone is uncollected.
    Visit {
        photo: PathBuf,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Stands in for the device GPS: a coordinate supplied on the command line.
struct CliFix {
    coordinate: Option<Coordinate>,
}

#[async_trait::async_trait]
impl LocationProvider for CliFix {
    async fn current_location(&self) -> Result<Coordinate, LocationError> {
        self.coordinate.ok_or(LocationError::Unsupported)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("citystamp v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let api = ApiClient::new(ApiConfig {
        base_url: cli.api_url.clone(),
        nonce: cli.nonce.clone(),
    });

    match cli.command {
        Commands::Zones => {
            let zones = api.fetch_zones().await?;
            display::print_zone_list(&zones);
        }
        Commands::Visits => {
            let visits = api.fetch_my_visits().await?;
            display::print_visits(&visits);
        }
        Commands::Stamp {
            photo,
            lat,
            lng,
            out,
        } => {
            let coordinate = match (lat, lng) {
                (Some(lat), Some(lng)) => Some(Coordinate { lat, lng }),
                _ => None,
            };
            run_capture(api, &cli.font, &photo, coordinate, out, false).await?;
        }
        Commands::Visit {
            photo,
            lat,
            lng,
            out,
        } => {
            let coordinate = Some(Coordinate { lat, lng });
            run_capture(api, &cli.font, &photo, coordinate, out, true).await?;
        }
    }
    Ok(())
}

/// One full capture: acquire a location, stamp the photo, report the visit
/// state, and optionally submit.
async fn run_capture(
    api: ApiClient,
    font_path: &Path,
    photo: &Path,
    coordinate: Option<Coordinate>,
    out: Option<PathBuf>,
    submit: bool,
) -> anyhow::Result<()> {
    let font = load_font(font_path)?;
    let pipeline = StampPipeline::new(font);
    let mut session = CaptureSession::start(api).await?;

    let mut tracker = LocationTracker::new(CliFix { coordinate });
    let coordinate = tracker.acquire().await;

    let bytes = fs::read(photo).with_context(|| format!("reading {}", photo.display()))?;
    let start = session.begin_capture(coordinate);
    let output = pipeline
        .process(&bytes, start.zone.as_ref())
        .context("could not process the photo, please retake it")?;
    session.finish_pipeline(start.seq, output);
    session.refresh_history().await?;

    let state = session
        .state()
        .context("capture did not produce a state")?;
    display::print_state(state, session.matched_zone());

    if let Some(output) = session.output() {
        let path = out.unwrap_or_else(|| default_output_path(session.matched_zone()));
        write_stamped_jpeg(&output.encoded_image, &path)?;
        println!("Saved {}", path.display());
    }

    if submit && state.can_submit() {
        match session.submit().await {
            SubmitOutcome::Accepted(message) => println!("{message}"),
            SubmitOutcome::Rejected(message) => println!("Submission failed: {message}"),
            SubmitOutcome::AlreadyPending => println!("A submission is already in flight."),
            SubmitOutcome::NotReady => println!("Nothing to submit for this capture."),
        }
    }
    Ok(())
}

/// `stamp-<zone slug>-<timestamp>.jpg` in the working directory.
fn default_output_path(zone: Option<&Zone>) -> PathBuf {
    let slug = zone
        .map(|z| {
            z.name
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-")
                .to_lowercase()
        })
        .unwrap_or_else(|| "photo".to_string());
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("stamp-{slug}-{stamp}.jpg"))
}

fn write_stamped_jpeg(encoded_image: &str, path: &Path) -> anyhow::Result<()> {
    let payload = encoded_image
        .strip_prefix("data:image/jpeg;base64,")
        .context("unexpected image payload format")?;
    let jpeg = general_purpose::STANDARD
        .decode(payload)
        .context("decoding image payload")?;
    fs::write(path, jpeg).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
