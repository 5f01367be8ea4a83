use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

/// Progress tracking and reporting.
///
/// `ByteProgress` draws the bar for a single file; `BatchReport` keeps the
/// per-video results of a download run and prints the final summary.

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Byte counter for one file transfer.
pub struct ByteProgress {
    bar: ProgressBar,
    written: u64,
}

impl ByteProgress {
    /// A bar when the total is known, a spinner otherwise.
    pub fn new(total: Option<u64>) -> Self {
        let bar = match total.filter(|t| *t > 0) {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        Self { bar, written: 0 }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.written += bytes;
        self.bar.inc(bytes);
        if self.bar.length().is_none() {
            self.bar.set_message(format!("{} written", HumanBytes(self.written)));
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// What happened to one video of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Downloaded { path: PathBuf, bytes: u64 },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct VideoResult {
    pub video_id: String,
    pub name: String,
    pub outcome: Outcome,
}

/// Tracks results for a batch of videos.
///
/// # Examples
///
/// ```
/// use vimeo_downloader::progress::{BatchReport, Outcome};
///
/// let mut report = BatchReport::new(2);
/// report.record("1", "first", Outcome::Failed { error: "no rendition".into() });
/// assert_eq!(report.failed(), 1);
/// ```
#[derive(Debug)]
pub struct BatchReport {
    pub total_videos: usize,
    pub start_time: Instant,
    results: Vec<VideoResult>,
}

impl BatchReport {
    pub fn new(total_videos: usize) -> Self {
        Self {
            total_videos,
            start_time: Instant::now(),
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, video_id: &str, name: &str, outcome: Outcome) {
        self.results.push(VideoResult {
            video_id: video_id.to_string(),
            name: name.to_string(),
            outcome,
        });
    }

    /// Videos that were processed, whatever the outcome.
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &VideoResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn print_summary(&self) {
        println!("\nDownload Summary:");
        println!("Total time: {:.1}s", self.start_time.elapsed().as_secs_f64());
        println!("Videos processed: {}/{}", self.attempted(), self.total_videos);
        println!("Successfully downloaded: {}", self.downloaded());
        println!("Skipped: {}", self.skipped());
        println!("Failed: {}", self.failed());

        for failure in self.failures() {
            if let Outcome::Failed { error } = &failure.outcome {
                println!("  - {} (ID: {}): {}", failure.name, failure.video_id, error);
            }
        }
    }
}
