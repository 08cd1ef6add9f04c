//! JSONL event source adapter.
//!
//! Reads protocol events from JSONL files (one JSON event per line) and
//! decodes each line into an [`Event`]. A directory is read file by file in
//! name order, so an exported log split into `00001.jsonl`, `00002.jsonl`, ...
//! replays in causal order.

use super::{EventSource, SourceStats};
use crate::{Error, Result};
use stakeindex_core::Event;
use stakeindex_core::metrics::increment;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Configuration for the JSONL source.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Input file or directory path.
    pub input: PathBuf,

    /// Skip undecodable lines instead of failing the run.
    pub continue_on_error: bool,

    /// Limit number of files to process (for testing).
    pub limit: Option<usize>,

    /// Progress reporting interval (events).
    pub progress_interval: usize,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            continue_on_error: false,
            limit: None,
            progress_interval: 100_000,
        }
    }
}

/// JSONL file event source.
pub struct JsonlSource {
    config: JsonlConfig,
}

impl JsonlSource {
    pub fn new(config: JsonlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JsonlConfig {
        &self.config
    }

    /// Collect files to process based on input path.
    fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let input = &self.config.input;
        let mut files = Vec::new();

        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let mut entries: Vec<_> = fs::read_dir(input)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .is_some_and(|ext| ext == "jsonl" || ext == "json" || ext == "ndjson")
                })
                .collect();

            // File names carry the log order.
            entries.sort();
            files = entries;
        } else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Input path does not exist: {}", input.display()),
            )));
        }

        if let Some(limit) = self.config.limit {
            files.truncate(limit);
        }

        Ok(files)
    }

    /// Process a single JSONL file. Returns `Ok(false)` if the handler stopped.
    fn process_file<F>(&self, file_path: &Path, handler: &mut F, stats: &mut SourceStats) -> Result<bool>
    where
        F: FnMut(Event) -> Result<bool>,
    {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            stats.total_events += 1;
            increment("source_lines_total", 1);

            let event = match serde_json::from_str::<Event>(&line) {
                Ok(event) => event,
                Err(e) => {
                    stats.invalid_events += 1;
                    increment("source_parse_errors_total", 1);
                    if self.config.continue_on_error {
                        tracing::warn!(
                            "{}:{}: skipping undecodable event: {}",
                            file_path.display(),
                            line_num + 1,
                            e
                        );
                        continue;
                    }
                    return Err(Error::Serialization(e));
                }
            };

            stats.valid_events += 1;

            if !handler(event)? {
                tracing::info!("Handler signaled stop");
                return Ok(false);
            }

            if stats.total_events.is_multiple_of(self.config.progress_interval) {
                tracing::info!(
                    "Progress: {} events, {} valid, {} invalid",
                    stats.total_events,
                    stats.valid_events,
                    stats.invalid_events
                );
            }
        }

        Ok(true)
    }
}

impl EventSource for JsonlSource {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn process<F>(&mut self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(Event) -> Result<bool>,
    {
        let mut stats = SourceStats::default();

        let files = self.collect_files()?;
        tracing::info!("Found {} JSONL files to process", files.len());

        for (file_idx, file_path) in files.iter().enumerate() {
            tracing::info!(
                "[{}/{}] Processing: {}",
                file_idx + 1,
                files.len(),
                file_path.display()
            );

            stats.bytes_read += fs::metadata(file_path)?.len() as usize;
            increment("source_files_total", 1);

            let keep_going = self.process_file(file_path, &mut handler, &mut stats)?;
            stats.files_processed += 1;
            if !keep_going {
                break;
            }
        }

        Ok(stats)
    }
}
