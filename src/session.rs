//! Terminal presentation loop for a ranking session.
//!
//! Reads one command per line, drives a [`PairwiseRanker`], and prints the
//! current pair plus the ranking table after every vote. Input and output are
//! generic so tests can script a whole session.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::evaluation::SharpnessEvaluator;
use crate::export::{export_ranking_csv, render_ranking_table, DEFAULT_EXPORT_PATH};
use crate::ranker::{ActivePair, PairwiseRanker, RankerError, Side};
use crate::thumbnail::{render_candidate, ThumbnailError, ThumbnailSpec};
use crate::trace::{now_epoch_ms, TraceSink, VoteSource, VoteTrace};

pub const HELP_TEXT: &str = "\
Commands:
  l, left, 1        vote for the left image
  r, right, 2       vote for the right image
  s, skip           draw a fresh pair without voting
  t, table          show the ranking
  e, export [path]  write the ranking CSV
  rate l|r          ask the AI to rate one image's sharpness
  compare           ask the AI which image is sharper
  auto              vote for the image the AI finds sharper
  h, help           show this help
  q, quit           end the session";

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Vote(Side),
    Skip,
    Table,
    Export(Option<PathBuf>),
    Rate(Side),
    Compare,
    Auto,
    Help,
    Quit,
}

impl SessionCommand {
    /// Parse one input line. Returns `None` for blank or unknown input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let head = words.next()?.to_lowercase();
        let arg = words.next();

        let cmd = match head.as_str() {
            "s" | "skip" => SessionCommand::Skip,
            "t" | "table" => SessionCommand::Table,
            "e" | "export" => SessionCommand::Export(arg.map(PathBuf::from)),
            "rate" => SessionCommand::Rate(Side::parse(arg?)?),
            "compare" => SessionCommand::Compare,
            "auto" => SessionCommand::Auto,
            "h" | "help" | "?" => SessionCommand::Help,
            "q" | "quit" | "exit" => SessionCommand::Quit,
            other => SessionCommand::Vote(Side::parse(other)?),
        };
        Some(cmd)
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Ranker(#[from] RankerError),
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    InputClosed,
    /// Fewer than two decodable candidates remain.
    CandidatesExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub votes: usize,
    pub rounds: usize,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Folder the candidate identifiers are relative to.
    pub folder: PathBuf,
    /// Default target of the export command.
    pub export_path: PathBuf,
    /// When set, `left.png` and `right.png` previews are written here.
    pub preview_dir: Option<PathBuf>,
    pub preview_spec: ThumbnailSpec,
}

impl SessionOptions {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
            preview_dir: None,
            preview_spec: ThumbnailSpec::default(),
        }
    }
}

enum Flow {
    Continue,
    End(SessionEnd),
}

enum PreviewFailure {
    /// The candidate's own file; the candidate is dropped.
    Unreadable { id: String, source: ThumbnailError },
    /// The preview target; the candidates are untouched.
    Unwritable { path: PathBuf, source: std::io::Error },
}

pub struct RankingSession<R: Rng = StdRng> {
    ranker: PairwiseRanker<R>,
    options: SessionOptions,
    evaluator: Option<Arc<SharpnessEvaluator>>,
    trace: Option<Arc<dyn TraceSink>>,
    session_id: Uuid,
    votes: usize,
}

impl<R: Rng> RankingSession<R> {
    pub fn new(ranker: PairwiseRanker<R>, options: SessionOptions) -> Self {
        Self {
            ranker,
            options,
            evaluator: None,
            trace: None,
            session_id: Uuid::new_v4(),
            votes: 0,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<SharpnessEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn ranker(&self) -> &PairwiseRanker<R> {
        &self.ranker
    }

    pub fn into_ranker(self) -> PairwiseRanker<R> {
        self.ranker
    }

    /// Run until `quit`, end of input, or the candidates run out.
    ///
    /// Fails only on terminal I/O errors or when no first pair can be drawn.
    pub async fn run<I: BufRead, O: Write>(
        &mut self,
        input: I,
        mut out: O,
    ) -> Result<SessionSummary, SessionError> {
        info!(
            session_id = %self.session_id,
            candidates = self.ranker.candidates().len(),
            "ranking session started"
        );
        writeln!(
            out,
            "Ranking {} images. Type h for help.",
            self.ranker.candidates().len()
        )?;

        if let Flow::End(_) = self.fresh_pair(&mut out)? {
            return Err(RankerError::InsufficientCandidates {
                found: self.ranker.candidates().len(),
            }
            .into());
        }

        let mut end = SessionEnd::InputClosed;
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let Some(cmd) = SessionCommand::parse(&line) else {
                writeln!(out, "Unknown command '{}'. Type h for help.", line.trim())?;
                continue;
            };
            debug!(?cmd, "session command");

            if let Flow::End(reason) = self.dispatch(cmd, &mut out).await? {
                end = reason;
                break;
            }
        }

        writeln!(out, "{}", render_ranking_table(&self.ranker.snapshot_ranking()))?;
        let summary = self.summary(end);
        info!(
            session_id = %self.session_id,
            votes = summary.votes,
            end = ?summary.end,
            "ranking session ended"
        );
        Ok(summary)
    }

    async fn dispatch<O: Write>(
        &mut self,
        cmd: SessionCommand,
        out: &mut O,
    ) -> Result<Flow, SessionError> {
        match cmd {
            SessionCommand::Vote(side) => self.vote(side, VoteSource::User, out),
            SessionCommand::Skip => self.fresh_pair(out),
            SessionCommand::Table => {
                writeln!(out, "{}", render_ranking_table(&self.ranker.snapshot_ranking()))?;
                Ok(Flow::Continue)
            }
            SessionCommand::Export(path) => {
                let path = path.unwrap_or_else(|| self.options.export_path.clone());
                match export_ranking_csv(&path, &self.ranker.snapshot_ranking()) {
                    Ok(()) => writeln!(out, "Ranking exported to {}", path.display())?,
                    Err(err) => writeln!(out, "Export failed: {err}")?,
                }
                Ok(Flow::Continue)
            }
            SessionCommand::Rate(side) => {
                self.rate(side, out).await?;
                Ok(Flow::Continue)
            }
            SessionCommand::Compare => {
                self.compare(out).await?;
                Ok(Flow::Continue)
            }
            SessionCommand::Auto => match self.compare(out).await? {
                Some(side) => self.vote(side, VoteSource::AiComparison, out),
                None => Ok(Flow::Continue),
            },
            SessionCommand::Help => {
                writeln!(out, "{HELP_TEXT}")?;
                Ok(Flow::Continue)
            }
            SessionCommand::Quit => Ok(Flow::End(SessionEnd::Quit)),
        }
    }

    // =========================================================================
    // Voting and pairs
    // =========================================================================

    fn vote<O: Write>(
        &mut self,
        side: Side,
        source: VoteSource,
        out: &mut O,
    ) -> Result<Flow, SessionError> {
        let Some(pair) = self.ranker.active_pair().cloned() else {
            return self.fresh_pair(out);
        };
        let winner_votes = match self.ranker.record_choice(side) {
            Ok(votes) => votes,
            Err(err) => {
                writeln!(out, "Vote not recorded: {err}")?;
                return Ok(Flow::Continue);
            }
        };
        self.votes += 1;
        self.record_trace(VoteTrace {
            timestamp_ms: now_epoch_ms(),
            session_id: self.session_id.to_string(),
            vote_index: self.votes,
            side,
            winner: pair.get(side).to_string(),
            loser: pair.get(side.opposite()).to_string(),
            winner_votes,
            source,
        });

        writeln!(out, "{}", render_ranking_table(&self.ranker.snapshot_ranking()))?;

        match self.ranker.advance(side) {
            Ok(_) => self.present(Some(side), out),
            Err(RankerError::NoAlternativeCandidate) => {
                writeln!(out, "No other image left to compare against.")?;
                Ok(Flow::End(SessionEnd::CandidatesExhausted))
            }
            Err(err) => {
                writeln!(out, "{err}")?;
                self.fresh_pair(out)
            }
        }
    }

    fn fresh_pair<O: Write>(&mut self, out: &mut O) -> Result<Flow, SessionError> {
        match self.ranker.start_round() {
            Ok(_) => self.present(None, out),
            Err(RankerError::InsufficientCandidates { found }) => {
                writeln!(out, "Not enough images left to compare ({found}).")?;
                Ok(Flow::End(SessionEnd::CandidatesExhausted))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Show the active pair.
    ///
    /// A candidate whose image cannot be read or decoded is dropped. When the
    /// other side is `keep`, it stays on screen against a new challenger;
    /// otherwise a fresh pair is drawn. Failing to write a preview file only
    /// prints a notice.
    fn present<O: Write>(
        &mut self,
        mut keep: Option<Side>,
        out: &mut O,
    ) -> Result<Flow, SessionError> {
        loop {
            let Some(pair) = self.ranker.active_pair().cloned() else {
                return Ok(Flow::Continue);
            };

            match self.write_previews(&pair) {
                Ok(()) => {}
                Err(PreviewFailure::Unwritable { path, source }) => {
                    warn!(path = %path.display(), error = %source, "preview not written");
                    writeln!(out, "Preview not written to {}: {source}", path.display())?;
                }
                Err(PreviewFailure::Unreadable { id, source }) => {
                    warn!(candidate = %id, error = %source, "dropping unreadable image");
                    writeln!(out, "Skipping {id}: {source}")?;
                    let kept = keep
                        .map(|side| (side, pair.get(side).to_string()))
                        .filter(|(_, kept)| *kept != id);
                    self.ranker.remove_candidate(&id)?;
                    keep = kept.as_ref().map(|(side, _)| *side);

                    let next = match &kept {
                        Some((side, kept)) => self.ranker.challenge(kept, *side),
                        None => self.ranker.start_round(),
                    };
                    match next {
                        Ok(_) => continue,
                        Err(
                            RankerError::InsufficientCandidates { .. }
                            | RankerError::NoAlternativeCandidate,
                        ) => {
                            writeln!(
                                out,
                                "Not enough images left to compare ({}).",
                                self.ranker.candidates().len()
                            )?;
                            return Ok(Flow::End(SessionEnd::CandidatesExhausted));
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }

            writeln!(out, "Left:  {}", pair.left)?;
            writeln!(out, "Right: {}", pair.right)?;
            return Ok(Flow::Continue);
        }
    }

    /// Render both previews before saving either, so an unreadable candidate
    /// is always detected.
    fn write_previews(&self, pair: &ActivePair) -> Result<(), PreviewFailure> {
        let Some(dir) = self.options.preview_dir.as_deref() else {
            return Ok(());
        };
        let render = |id: &str| {
            render_candidate(&self.options.folder, id, self.options.preview_spec).map_err(
                |source| PreviewFailure::Unreadable {
                    id: id.to_string(),
                    source,
                },
            )
        };
        let left = render(pair.left.as_str())?;
        let right = render(pair.right.as_str())?;

        for (thumb, file) in [(left, "left.png"), (right, "right.png")] {
            let path = dir.join(file);
            thumb
                .save(&path)
                .map_err(|source| PreviewFailure::Unwritable { path, source })?;
        }
        Ok(())
    }

    fn record_trace(&self, event: VoteTrace) {
        if let Some(trace) = &self.trace {
            if let Err(err) = trace.record(event) {
                warn!(error = %err, "vote trace write failed");
            }
        }
    }

    // =========================================================================
    // AI evaluation
    // =========================================================================

    async fn rate<O: Write>(&self, side: Side, out: &mut O) -> Result<(), SessionError> {
        let Some((evaluator, pair)) = self.evaluation_context(out)? else {
            return Ok(());
        };
        let id = pair.get(side);
        writeln!(out, "Rating {id}...")?;
        match evaluator.rate(&self.candidate_path(id)).await {
            Ok(rating) => {
                match rating.score {
                    Some(score) => writeln!(out, "Sharpness of {}: {score}/10", rating.image)?,
                    None => writeln!(out, "Sharpness of {}:", rating.image)?,
                }
                writeln!(out, "{}", rating.feedback)?;
            }
            Err(err) => writeln!(out, "{}", err.user_message())?,
        }
        Ok(())
    }

    /// Print the AI comparison; returns the sharper side when there is one.
    async fn compare<O: Write>(&self, out: &mut O) -> Result<Option<Side>, SessionError> {
        let Some((evaluator, pair)) = self.evaluation_context(out)? else {
            return Ok(None);
        };
        writeln!(out, "Comparing {} and {}...", pair.left, pair.right)?;
        let result = evaluator
            .compare(
                &self.candidate_path(&pair.left),
                &self.candidate_path(&pair.right),
            )
            .await;
        match result {
            Ok(cmp) => {
                let side = cmp.verdict.and_then(|v| v.side());
                match side {
                    Some(side) => writeln!(out, "Sharper: {} ({side})", pair.get(side))?,
                    None => writeln!(out, "No clear winner.")?,
                }
                writeln!(out, "{}", cmp.feedback)?;
                Ok(side)
            }
            Err(err) => {
                writeln!(out, "{}", err.user_message())?;
                Ok(None)
            }
        }
    }

    fn evaluation_context<O: Write>(
        &self,
        out: &mut O,
    ) -> Result<Option<(Arc<SharpnessEvaluator>, ActivePair)>, SessionError> {
        let Some(evaluator) = self.evaluator.clone() else {
            writeln!(
                out,
                "AI evaluation is disabled; set OPENROUTER_API_KEY to enable it."
            )?;
            return Ok(None);
        };
        let Some(pair) = self.ranker.active_pair().cloned() else {
            writeln!(out, "No pair is being shown.")?;
            return Ok(None);
        };
        Ok(Some((evaluator, pair)))
    }

    fn candidate_path(&self, id: &str) -> PathBuf {
        self.options.folder.join(id)
    }

    fn summary(&self, end: SessionEnd) -> SessionSummary {
        SessionSummary {
            end,
            votes: self.votes,
            rounds: self.ranker.rounds_played(),
        }
    }
}
