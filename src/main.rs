use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use platescan::upload::upload_image;
use platescan::{
    DetectionStage, EventDispatcher, FsObjectStore, NotifyingStore, ObjectStore, OcrStage,
    OcrsRecognizer, PollOutcome, ResultDb, ResultTable, RetrievalPoller, Settings, StageReport,
    StorageEvent, YoloPlateDetector,
};

#[derive(Parser)]
#[command(name = "platescan")]
#[command(about = "Detect license plates in uploaded images and read them with OCR")]
struct Cli {
    /// JSON settings file (defaults apply to anything it leaves out)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the object store root directory; the result table moves with
    /// it unless the config file sets `table_path`
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle a storage notification document, as the platform would.
    /// Raw-bucket keys nested under a prefix are ignored.
    HandleEvent {
        /// Notification JSON file, or `-` for stdin
        #[arg(value_name = "FILE")]
        event: PathBuf,
    },
    /// Upload images, run both stages locally and wait for each result
    Upload {
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,
    },
    /// Wait for the result of an already uploaded object key
    Poll {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Print every row of the result table as JSON lines
    Records,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let mut settings = Settings::load_or_default(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        settings = settings.with_data_dir(data_dir);
    }

    let table = Arc::new(ResultDb::open(settings.storage.table_path()).await?);
    log::debug!("Result table at {:?}", table.db_file());

    match args.command {
        Command::HandleEvent { event } => handle_event(&settings, table, &event).await,
        Command::Upload { images } => upload(&settings, table, &images).await,
        Command::Poll { key } => {
            let poller = RetrievalPoller::from_settings(table, &settings.poller);
            print_outcome(&key, &poller.fetch(&key).await?)
        }
        Command::Records => {
            for record in table.scan().await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
    }
}

async fn handle_event(settings: &Settings, table: Arc<ResultDb>, event: &Path) -> anyhow::Result<()> {
    let body = if event.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(event)?
    };
    let events = StorageEvent::from_notification(&body)?;

    let store = Arc::new(FsObjectStore::new(&settings.storage.data_dir));
    log::debug!("Object store at {:?}", store.root());
    let dispatcher = build_dispatcher(settings, store, table)?;
    for event in &events {
        match dispatcher.dispatch(event).await? {
            StageReport::Detection(summary) => log::info!(
                "{}: {} plate(s), {} record(s) written",
                summary.image_key,
                summary.plates,
                summary.records.len()
            ),
            StageReport::Ocr(outcome) => log::info!("{}: {:?}", event.key, outcome),
            StageReport::Ignored => log::info!("{}/{}: no stage for this object", event.bucket, event.key),
        }
    }
    Ok(())
}

async fn upload(settings: &Settings, table: Arc<ResultDb>, images: &[PathBuf]) -> anyhow::Result<()> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let store = Arc::new(NotifyingStore::new(
        FsObjectStore::new(&settings.storage.data_dir),
        tx,
    ));
    let dispatcher = Arc::new(build_dispatcher(settings, Arc::clone(&store), Arc::clone(&table))?);
    let runner = tokio::spawn(dispatcher.run(rx));

    let poller = RetrievalPoller::from_settings(table, &settings.poller);
    for image in images {
        let key = match upload_image(&*store, &settings.storage.raw_bucket, image).await {
            Ok(key) => key,
            Err(e) => {
                log::error!("Skipping {}: {:#}", image.display(), e);
                continue;
            }
        };
        log::info!("Waiting for results for {}...", key);
        match poller.fetch(&key).await {
            Ok(outcome) => print_outcome(&key, &outcome)?,
            Err(e) => log::error!("Failed to fetch results for {}: {:#}", key, e),
        }
    }

    // Let invocations already queued or running finish before exiting.
    store.close_events();
    runner.await?;
    Ok(())
}

fn build_dispatcher<S: ObjectStore, T: ResultTable>(
    settings: &Settings,
    store: Arc<S>,
    table: Arc<T>,
) -> anyhow::Result<EventDispatcher<S, T, YoloPlateDetector, OcrsRecognizer>> {
    let detector = YoloPlateDetector::load(&settings.detector)?;
    let recognizer = OcrsRecognizer::load(&settings.ocr)?;

    let detection = DetectionStage::new(
        Arc::clone(&store),
        Arc::clone(&table),
        detector,
        settings.storage.plate_bucket.clone(),
        settings.detector.target_label.clone(),
    );
    let ocr = OcrStage::new(store, table, recognizer);
    Ok(EventDispatcher::new(detection, ocr, settings.storage.clone()))
}

fn print_outcome(key: &str, outcome: &PollOutcome) -> anyhow::Result<()> {
    match outcome {
        PollOutcome::NoPlate(record) => {
            println!("No plate detected in {}", key);
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        PollOutcome::Recognized(record) => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        PollOutcome::TimedOut { attempts } => {
            eprintln!(
                "Timed out after {} attempts: no result found for {}",
                attempts, key
            );
        }
    }
    Ok(())
}
