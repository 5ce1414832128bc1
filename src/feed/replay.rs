//! File-backed feed producer.
//!
//! Replays a gzip-compressed, line-delimited dump of feed JSON into the
//! input queue from its own thread, standing in for the live websocket
//! client. At end of file it sends the `None` sentinel so the worker
//! drains and stops.

use super::message::{FeedError, FeedMessage};
use crossbeam::channel::Sender;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Counters reported by a finished replay thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Lines read from the file.
    pub lines: u64,
    /// Lines decoded and queued.
    pub queued: u64,
    /// Lines that failed to decode and were skipped.
    pub undecodable: u64,
}

/// Producer replaying a recorded feed file into the input queue.
pub struct FeedReplayer;

impl FeedReplayer {
    /// Open `path` and start the replay thread.
    ///
    /// Failing to open the file is a structural startup error and is
    /// returned to the caller; once the thread is running, undecodable
    /// lines are logged and skipped, never fatal.
    ///
    /// # Errors
    /// [`FeedError::Io`] when the feed file cannot be opened.
    pub fn spawn(
        path: &Path,
        queue: Sender<Option<FeedMessage>>,
    ) -> Result<JoinHandle<ReplayStats>, FeedError> {
        let file = File::open(path)?;
        let reader = BufReader::new(GzDecoder::new(file));
        let path: PathBuf = path.to_path_buf();
        info!("replaying recorded feed from {}", path.display());

        let handle = thread::Builder::new()
            .name("feed-replayer".to_string())
            .spawn(move || Self::pump(reader, &queue, &path))?;
        Ok(handle)
    }

    fn pump(
        reader: BufReader<GzDecoder<File>>,
        queue: &Sender<Option<FeedMessage>>,
        path: &Path,
    ) -> ReplayStats {
        let mut stats = ReplayStats::default();
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("read error in {}: {err}; ending replay", path.display());
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            stats.lines += 1;
            match FeedMessage::from_json_line(&line) {
                Ok(message) => {
                    if queue.send(Some(message)).is_err() {
                        debug!("input queue closed; ending replay early");
                        return stats;
                    }
                    stats.queued += 1;
                }
                Err(err) => {
                    stats.undecodable += 1;
                    warn!("undecodable feed line skipped: {err}");
                }
            }
        }
        // EOF sentinel; the worker treats it as end of input.
        let _ = queue.send(None);
        info!(
            "feed replay finished: {} lines, {} queued, {} undecodable",
            stats.lines, stats.queued, stats.undecodable
        );
        stats
    }
}
