#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use image_ranker::discovery::discover_images;
use image_ranker::evaluation::{EvaluationError, EvaluatorConfig, SharpnessEvaluator};
use image_ranker::export::DEFAULT_EXPORT_PATH;
use image_ranker::gateway::{ChatGateway, ProviderError, ProviderGateway, TracingUsageSink};
use image_ranker::ranker::{PairwiseRanker, Side};
use image_ranker::session::{RankingSession, SessionEnd, SessionOptions};
use image_ranker::thumbnail::{
    render_thumbnail, ThumbnailSpec, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
};
use image_ranker::trace::{JsonlTraceSink, TraceSink};

#[derive(Parser)]
#[command(name = "image-ranker", version, about = "Rank images by pairwise choice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the images a session would rank
    List {
        #[arg(long, default_value = "./images")]
        folder: PathBuf,
    },
    /// Rank a folder interactively
    Session {
        #[arg(long, default_value = "./images")]
        folder: PathBuf,
        /// Default CSV target of the export command
        #[arg(long, default_value = DEFAULT_EXPORT_PATH)]
        out: PathBuf,
        /// Seed for a reproducible pair sequence
        #[arg(long)]
        seed: Option<u64>,
        /// JSONL vote trace output
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Write left.png / right.png previews of the current pair here
        #[arg(long)]
        preview_dir: Option<PathBuf>,
        /// OpenRouter vision model id
        #[arg(long)]
        model: Option<String>,
        /// Disable AI sharpness evaluation
        #[arg(long)]
        no_ai: bool,
    },
    /// Render one image's preview as PNG
    Thumbnail {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
        max_width: u32,
        #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT)]
        max_height: u32,
    },
    /// Ask the AI to rate one image's sharpness
    Rate {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        model: Option<String>,
    },
    /// Ask the AI which of two images is sharper
    Compare {
        #[arg(long)]
        left: PathBuf,
        #[arg(long)]
        right: PathBuf,
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::List { folder } => {
            for name in discover_images(&folder)? {
                println!("{name}");
            }
        }
        Commands::Session {
            folder,
            out,
            seed,
            trace,
            preview_dir,
            model,
            no_ai,
        } => {
            let ids = discover_images(&folder)?;
            let ranker = match seed {
                Some(seed) => PairwiseRanker::seeded(ids, seed)?,
                None => PairwiseRanker::new(ids)?,
            };

            if let Some(dir) = &preview_dir {
                std::fs::create_dir_all(dir)?;
            }
            let session_id = Uuid::new_v4();
            let mut options = SessionOptions::new(folder.clone());
            options.export_path = out;
            options.preview_dir = preview_dir;

            let mut session = RankingSession::new(ranker, options).with_session_id(session_id);

            if no_ai {
                eprintln!("[session] AI evaluation disabled");
            } else {
                match build_evaluator(model) {
                    Ok(evaluator) => {
                        session = session
                            .with_evaluator(Arc::new(evaluator.with_session(session_id)));
                    }
                    Err(err) => eprintln!("[session] AI evaluation unavailable: {err}"),
                }
            }

            let (trace_sink, trace_worker) = match trace {
                Some(path) => {
                    let (sink, worker) = JsonlTraceSink::new(path)?;
                    (Some(Arc::new(sink) as Arc<dyn TraceSink>), Some(worker))
                }
                None => (None, None),
            };
            if let Some(sink) = trace_sink {
                session = session.with_trace(sink);
            }

            // The trace worker flushes only once every sender is gone, so join
            // it before a failed run is propagated.
            let result = session.run(io::stdin().lock(), io::stdout()).await;
            drop(session);
            if let Some(worker) = trace_worker {
                worker.join()?;
            }
            let summary = result?;

            eprintln!(
                "[session] {} votes over {} pairs",
                summary.votes, summary.rounds
            );
            if summary.end == SessionEnd::CandidatesExhausted {
                eprintln!("[session] ended early: not enough readable images");
            }
        }
        Commands::Thumbnail {
            image,
            out,
            max_width,
            max_height,
        } => {
            let thumb = render_thumbnail(&image, ThumbnailSpec::new(max_width, max_height))?;
            thumb.save(&out)?;
            println!("{}x{} -> {}", thumb.width, thumb.height, out.display());
        }
        Commands::Rate { image, model } => {
            let evaluator = build_evaluator(model).map_err(user_error)?;
            let rating = evaluator.rate(&image).await.map_err(user_error)?;
            match rating.score {
                Some(score) => println!("{}: {score}/10", rating.image),
                None => println!("{}:", rating.image),
            }
            println!("{}", rating.feedback);
        }
        Commands::Compare { left, right, model } => {
            let evaluator = build_evaluator(model).map_err(user_error)?;
            let cmp = evaluator
                .compare(&left, &right)
                .await
                .map_err(user_error)?;
            match cmp.verdict.and_then(|v| v.side()) {
                Some(side) => {
                    let name = match side {
                        Side::Left => &cmp.left,
                        Side::Right => &cmp.right,
                    };
                    println!("sharper: {name} ({side})");
                }
                None => println!("sharper: tie"),
            }
            println!("{}", cmp.feedback);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays the session transcript.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn user_error(err: impl Into<EvaluationError>) -> Box<dyn std::error::Error> {
    let err: EvaluationError = err.into();
    err.user_message().into()
}

fn build_evaluator(model: Option<String>) -> Result<SharpnessEvaluator, ProviderError> {
    let gateway: Arc<dyn ChatGateway> =
        Arc::new(ProviderGateway::from_env(Arc::new(TracingUsageSink))?);
    let mut config = EvaluatorConfig::from_env();
    if let Some(model) = model {
        config = config.with_model(model);
    }
    Ok(SharpnessEvaluator::new(gateway, config))
}
