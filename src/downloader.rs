use crate::api::{check_status, VimeoClient};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{select_best, Rendition, SelectionPolicy, Video};
use crate::progress::{BatchReport, ByteProgress, Outcome};
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

/// Which videos a run should download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Video(String),
}

/// Options for one download run, as given on the command line.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub target: Target,
    pub count: Option<usize>,
    pub skip: Vec<String>,
    pub policy: SelectionPolicy,
    pub debug: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            target: Target::All,
            count: None,
            skip: Vec::new(),
            policy: SelectionPolicy::default(),
            debug: false,
        }
    }
}

/// Downloads the best rendition of each selected video, one at a time.
///
/// # Fields
/// * `client` - Authenticated Vimeo API client
/// * `config` - Download directory and page size
/// * `options` - Target selection and output flags
pub struct Downloader {
    client: VimeoClient,
    config: Config,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new(client: VimeoClient, config: Config, options: DownloadOptions) -> Self {
        Self {
            client,
            config,
            options,
        }
    }

    /// Runs the whole batch.
    ///
    /// # Errors
    /// Fails without a report when the listing fails, when a requested
    /// video does not exist, or on authentication problems. Failures of
    /// individual videos are recorded in the report instead.
    pub async fn run(&self) -> Result<BatchReport> {
        tokio::fs::create_dir_all(&self.config.download_dir).await?;

        let videos = match &self.options.target {
            Target::Video(id) => vec![self.client.get_video(id).await?],
            Target::All => {
                self.client
                    .list_videos(self.config.page_size, None)
                    .await?
            }
        };

        let videos = limit_videos(videos, self.options.count);
        if let Some(notice) = limit_notice(self.options.count) {
            println!("{}", notice);
        }

        let mut report = BatchReport::new(videos.len());
        if videos.is_empty() {
            println!("No videos to download.");
            return Ok(report);
        }

        for video in &videos {
            let id = video.id();
            if self.options.skip.iter().any(|s| s == id) {
                println!("\nSkipping video: {} (ID: {}) as requested", video.name, id);
                report.record(id, &video.name, Outcome::Skipped { reason: "skip list".into() });
                continue;
            }

            println!("\nProcessing video: {} (ID: {})", video.name, id);
            match self.process_video(video).await {
                Ok(outcome) => report.record(id, &video.name, outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.report_failure(video, &e);
                    report.record(id, &video.name, Outcome::Failed { error: e.to_string() });
                }
            }
        }

        Ok(report)
    }

    #[instrument(skip(self, video), fields(video_id = %video.id()))]
    async fn process_video(&self, video: &Video) -> Result<Outcome> {
        if self.options.debug {
            println!("{}", debug_block("VIDEO JSON", &video.raw));
        }

        let rendition = self.resolve_rendition(video).await?;
        let path = self.config.download_dir.join(video.file_name(&rendition));

        if path.exists() {
            println!("File already exists: {}. Skipping.", path.display());
            return Ok(Outcome::Skipped {
                reason: "file already exists".into(),
            });
        }

        println!(
            "Downloading {} ({}, {}x{}, {:.2} MB)...",
            video.name,
            rendition.label(),
            rendition.width.unwrap_or(0),
            rendition.height.unwrap_or(0),
            rendition.size.unwrap_or(0) as f64 / (1024.0 * 1024.0)
        );

        let link = rendition.link.as_deref().unwrap_or_default();
        if self.options.debug {
            println!("{}", text_block("DOWNLOAD URL", link));
        }

        let bytes = self.fetch_to_file(link, &path, rendition.size).await?;
        println!("Downloaded: {}", path.display());
        info!(path = %path.display(), bytes, "download finished");

        Ok(Outcome::Downloaded { path, bytes })
    }

    /// Picks a rendition from the video itself. When the listing carried no
    /// links, tries the video's download endpoint and then the `download`
    /// and `files` fields of the video.
    async fn resolve_rendition(&self, video: &Video) -> Result<Rendition> {
        let policy = self.options.policy;

        let mut candidates = video.renditions();
        let mut best = video.best_rendition(policy);

        if best.is_none() {
            println!("Trying to get download links from the download endpoint...");
            match self.client.get_download_links(video.id()).await {
                Ok(links) => {
                    best = select_best(&links, policy).cloned();
                    candidates = links;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.report_lookup_error(video, "download endpoint", &e),
            }
        }

        if best.is_none() {
            println!(
                "No direct download links found for {}. Fetching download links explicitly...",
                video.name
            );
            match self.client.get_video_renditions(video.id()).await {
                Ok(detailed) => {
                    candidates = detailed.renditions();
                    best = detailed.best_rendition(policy);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.report_lookup_error(video, "renditions", &e),
            }
        }

        if self.options.debug {
            println!("{}", debug_block("DOWNLOAD LINKS", &candidates));
        }

        best.ok_or_else(|| AppError::Permission {
            video_id: video.id().to_string(),
            name: video.name.clone(),
        })
    }

    fn report_lookup_error(&self, video: &Video, what: &str, error: &AppError) {
        warn!("Could not fetch {} for {}: {}", what, video.id(), error);
        if self.options.debug {
            if let Some(body) = error.response_body() {
                println!("{}", error_body_block(body));
            }
        }
    }

    /// Streams `url` into `path`, going through a `.part` file.
    async fn fetch_to_file(
        &self,
        url: &str,
        path: &Path,
        declared_size: Option<u64>,
    ) -> Result<u64> {
        let part = part_path(path);
        let result = self.stream_into(url, &part, declared_size).await;

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&part, path).await?;
                Ok(bytes)
            }
            Err(e) => {
                if part.exists() {
                    if let Err(remove_err) = tokio::fs::remove_file(&part).await {
                        warn!("Could not delete partial file {}: {}", part.display(), remove_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_into(&self, url: &str, part: &Path, declared_size: Option<u64>) -> Result<u64> {
        let response = check_status(self.client.http().get(url).send().await?).await?;
        let total = response.content_length().or(declared_size);

        let mut file = tokio::fs::File::create(part).await?;
        let mut progress = ByteProgress::new(total);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    progress.abandon();
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await?;
            progress.advance(chunk.len() as u64);
        }

        file.flush().await?;
        progress.finish();
        Ok(progress.written())
    }

    fn report_failure(&self, video: &Video, error: &AppError) {
        match error {
            AppError::Permission { .. } => {
                println!("No download link available for {}. This could be due to:", video.name);
                println!("  - You don't have download permission for this video");
                println!("  - The video owner has disabled downloads");
                println!("  - The video is still being processed by Vimeo");
                println!("Skipping this video.");
            }
            other => {
                println!("Error downloading {}: {}", video.name, other);
                if self.options.debug {
                    if let Some(body) = other.response_body() {
                        println!("{}", error_body_block(body));
                    }
                }
            }
        }
    }
}

/// The message announcing a `--count` limit, if one applies.
pub fn limit_notice(count: Option<usize>) -> Option<String> {
    count
        .filter(|c| *c > 0)
        .map(|c| format!("Limiting download to {} videos", c))
}

/// Applies `--count`; zero means no limit.
pub fn limit_videos(mut videos: Vec<Video>, count: Option<usize>) -> Vec<Video> {
    if let Some(count) = count.filter(|c| *c > 0) {
        videos.truncate(count);
    }
    videos
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn text_block(title: &str, text: &str) -> String {
    format!("\n=== {} ===\n{}\n=== END {} ===\n", title, text, title)
}

/// Pretty-printed JSON framed by `=== TITLE ===` markers, as shown by `--debug`.
pub fn debug_block<T: Serialize + ?Sized>(title: &str, value: &T) -> String {
    let text = serde_json::to_string_pretty(value).unwrap_or_default();
    text_block(title, &text)
}

/// An API error body for `--debug`; JSON bodies are pretty-printed.
pub fn error_body_block(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => debug_block("ERROR RESPONSE", &value),
        Err(_) => text_block("ERROR RESPONSE", body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn videos(n: usize) -> Vec<Video> {
        (0..n)
            .map(|i| Video::from_value(json!({"uri": format!("/videos/{}", i)})).unwrap())
            .collect()
    }

    #[test]
    fn test_limit_videos() {
        let limited = limit_videos(videos(10), Some(3));
        let ids: Vec<&str> = limited.iter().map(Video::id).collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
        assert_eq!(limit_videos(videos(2), Some(5)).len(), 2);
        assert_eq!(limit_videos(videos(4), Some(0)).len(), 4);
        assert_eq!(limit_videos(videos(4), None).len(), 4);
    }

    #[test]
    fn test_limit_notice_only_for_positive_count() {
        assert_eq!(
            limit_notice(Some(3)).as_deref(),
            Some("Limiting download to 3 videos")
        );
        assert_eq!(limit_notice(Some(0)), None);
        assert_eq!(limit_notice(None), None);
    }

    #[test]
    fn test_debug_block_shows_raw_video_json() {
        let raw = json!({"uri": "/videos/42", "name": "Demo", "privacy": {"view": "anybody"}});
        let video = Video::from_value(raw.clone()).unwrap();

        let block = debug_block("VIDEO JSON", &video.raw);
        assert!(block.starts_with("\n=== VIDEO JSON ===\n"));
        assert!(block.ends_with("=== END VIDEO JSON ===\n"));
        assert!(block.contains(&serde_json::to_string_pretty(&raw).unwrap()));
    }

    #[test]
    fn test_debug_block_lists_candidates() {
        let video = Video::from_value(json!({
            "uri": "/videos/9",
            "download": [
                {"rendition": "360p", "height": 360, "size": 10, "link": "https://cdn/a.mp4"},
                {"rendition": "720p", "height": 720, "size": 20, "link": "https://cdn/b.mp4"}
            ]
        }))
        .unwrap();

        let block = debug_block("DOWNLOAD LINKS", &video.renditions());
        assert!(block.contains("=== DOWNLOAD LINKS ==="));
        assert!(block.contains("\"link\": \"https://cdn/a.mp4\""));
        assert!(block.contains("\"rendition\": \"720p\""));
    }

    #[test]
    fn test_error_body_block() {
        let block = error_body_block(r#"{"error":"Forbidden"}"#);
        assert!(block.contains("=== ERROR RESPONSE ==="));
        assert!(block.contains("\"error\": \"Forbidden\""));

        let plain = error_body_block("<html>bad gateway</html>");
        assert!(plain.contains("<html>bad gateway</html>"));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("downloads/a_1.mp4")),
            PathBuf::from("downloads/a_1.mp4.part")
        );
    }
}
