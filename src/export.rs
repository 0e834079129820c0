//! Ranking export: CSV files and fixed-width terminal tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::ranker::RankingEntry;

/// CSV header, fixed.
pub const CSV_HEADER: [&str; 3] = ["rank", "image_name", "votes"];

/// Where a session writes its ranking unless told otherwise.
pub const DEFAULT_EXPORT_PATH: &str = "rank.csv";

/// Minimum width of the filename column in the text table.
const MIN_NAME_WIDTH: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write ranking to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write `ranking` as CSV to any writer: header first, one row per entry.
pub fn write_ranking_csv<W: Write>(mut out: W, ranking: &[RankingEntry]) -> std::io::Result<()> {
    writeln!(out, "{}", CSV_HEADER.join(","))?;
    for entry in ranking {
        writeln!(
            out,
            "{},{},{}",
            entry.rank,
            csv_field(&entry.id),
            entry.votes
        )?;
    }
    out.flush()
}

/// Write `ranking` to a CSV file at `path`, replacing any existing file.
pub fn export_ranking_csv(path: &Path, ranking: &[RankingEntry]) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    write_ranking_csv(BufWriter::new(file), ranking).map_err(io_err)?;
    info!(path = %path.display(), rows = ranking.len(), "ranking exported");
    Ok(())
}

/// Quote a field if it contains a delimiter, quote or line break.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Render an "Image Filename | Votes" table for terminal display.
pub fn render_ranking_table(ranking: &[RankingEntry]) -> String {
    if ranking.is_empty() {
        return "Empty ranking".to_string();
    }

    let width = ranking
        .iter()
        .map(|e| e.id.chars().count())
        .max()
        .unwrap_or(0)
        .max(MIN_NAME_WIDTH);
    let rank_width = ranking.len().to_string().len().max(4);

    let mut lines = vec![
        format!(
            "{:>rank_width$}  {:<width$} | Votes",
            "Rank", "Image Filename"
        ),
        "-".repeat(rank_width + 2 + width + 10),
    ];
    for entry in ranking {
        lines.push(format!(
            "{:>rank_width$}  {:<width$} | {}",
            entry.rank, entry.id, entry.votes
        ));
    }
    lines.join("\n")
}
