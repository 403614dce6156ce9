//! Search session: embed a description, query the index, show the movies
//!
//! One session owns one [`CachedIndex`], so repeated descriptions within
//! the ttl are answered from the operation cache.
//!
//! Author: hephaex@gmail.com

use mm_catalog::{project, DisplayRow, MovieCatalog, ResultTable};
use mm_core::EmbeddingProvider;
use mm_vector::{CacheStatsReport, CachedIndex, QueryRequest};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const NO_MATCHES: &str =
    "No matching movies found. Please try again with a different description.";

const PROMPT: &str = "Describe a movie> ";

/// Per-query options shared by every search in a session
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub top_k: usize,
    pub ttl: Duration,
    pub namespace: Option<String>,
    pub synopsis_width: Option<usize>,
    pub json: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            ttl: Duration::from_secs(3600),
            namespace: None,
            synopsis_width: None,
            json: false,
        }
    }
}

pub struct SearchSession {
    embedder: Arc<dyn EmbeddingProvider>,
    index: CachedIndex,
    catalog: MovieCatalog,
    settings: SearchSettings,
}

impl SearchSession {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: CachedIndex,
        catalog: MovieCatalog,
        settings: SearchSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            catalog,
            settings,
        }
    }

    /// Movies whose plots best match `description`, most similar first
    pub async fn search(&self, description: &str) -> anyhow::Result<Vec<DisplayRow>> {
        let vector = self.embedder.embed(description).await?;

        let mut request = QueryRequest::new(vector, self.settings.top_k)
            .with_option("includeValues", false);
        if let Some(ns) = &self.settings.namespace {
            request = request.with_namespace(ns.clone());
        }

        let response = self.index.query(request, Some(self.settings.ttl)).await?;
        Ok(project(&response.matches, &self.catalog)?)
    }

    /// Write `rows` as a table, as JSON, or as the no-match notice
    pub fn render<W: Write>(&self, rows: &[DisplayRow], out: &mut W) -> anyhow::Result<()> {
        if self.settings.json {
            writeln!(out, "{}", serde_json::to_string_pretty(rows)?)?;
        } else if rows.is_empty() {
            writeln!(out, "{NO_MATCHES}")?;
        } else {
            let mut table = ResultTable::new(rows);
            if let Some(width) = self.settings.synopsis_width {
                table = table.with_synopsis_width(width);
            }
            writeln!(out, "Top {} matching movies:\n", table.num_rows())?;
            write!(out, "{}", table.to_markdown())?;
        }
        Ok(())
    }

    /// Answer descriptions line by line until `exit`, `quit` or end of input
    ///
    /// A failed search prints its message and the session carries on.
    pub async fn run_interactive<R, W>(
        &self,
        input: R,
        out: &mut W,
    ) -> anyhow::Result<CacheStatsReport>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();

        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(out)?;
                break;
            };
            let description = line.trim();
            match description {
                "" => continue,
                "exit" | "quit" => break,
                _ => {}
            }

            match self.search(description).await {
                Ok(rows) => self.render(&rows, out)?,
                Err(e) => {
                    tracing::warn!(error = %e, "Search failed");
                    writeln!(out, "Error: {e}")?;
                }
            }
        }

        Ok(self.index.cache().stats().report())
    }
}
