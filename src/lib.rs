#![forbid(unsafe_code)]

//! # image-ranker
//!
//! Rank a folder of images by repeated pairwise choice.
//!
//! Two images are shown; the user picks the better one; the pick gains a vote
//! and stays on screen against a fresh random challenger. Votes accumulate into a
//! ranking that can be exported as CSV. An optional vision model (via OpenRouter)
//! can rate or compare the sharpness of the images on screen.
//!
//! The ranking core (`ranker`) is synchronous and I/O free. Discovery,
//! thumbnails, export, AI evaluation and the terminal loop sit around it and
//! never own ranking state.

pub mod discovery;
pub mod evaluation;
pub mod export;
pub mod gateway;
pub mod prompts;
pub mod ranker;
pub mod session;
pub mod thumbnail;
pub mod trace;

pub use discovery::{discover_images, DiscoveryError};
pub use evaluation::{
    EvaluationError, EvaluatorConfig, SharpnessComparison, SharpnessEvaluator, SharpnessRating,
    Verdict,
};
pub use export::{export_ranking_csv, render_ranking_table, write_ranking_csv, ExportError};
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};
pub use ranker::{ActivePair, PairwiseRanker, RankerError, RankingEntry, Side};
pub use session::{RankingSession, SessionCommand, SessionEnd, SessionOptions, SessionSummary};
pub use thumbnail::{render_thumbnail, Thumbnail, ThumbnailError, ThumbnailSpec};
pub use trace::{JsonlTraceSink, TraceError, TraceSink, TraceWorker, VoteSource, VoteTrace};
