use crate::api::VimeoClient;
use crate::error::Result;
use crate::models::Video;
use chrono::DateTime;

/// Fetches the account's videos and prints one line per video.
pub async fn list(
    client: &VimeoClient,
    page_size: usize,
    limit: Option<usize>,
) -> Result<Vec<Video>> {
    let videos = client.list_videos(page_size, limit.filter(|l| *l > 0)).await?;

    if videos.is_empty() {
        println!("No videos found in your account.");
        return Ok(videos);
    }

    println!("Found {} videos:", videos.len());
    for (i, video) in videos.iter().enumerate() {
        println!("{}", format_line(i + 1, video));
    }
    Ok(videos)
}

/// `N. [id] name (duration seconds, privacy, created)`
pub fn format_line(index: usize, video: &Video) -> String {
    let created = video
        .created_time
        .as_deref()
        .map(|t| {
            DateTime::parse_from_rfc3339(t)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|_| t.to_string())
        })
        .unwrap_or_else(|| String::from("unknown date"));

    format!(
        "{}. [{}] {} ({} seconds, {}, {})",
        index,
        video.id(),
        video.name,
        video.duration,
        video.privacy_view(),
        created
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_line() {
        let video = Video::from_value(json!({
            "uri": "/videos/76979871",
            "name": "Intro",
            "duration": 62,
            "privacy": {"view": "nobody"},
            "created_time": "2023-05-01T10:20:30+00:00"
        }))
        .unwrap();
        assert_eq!(
            format_line(1, &video),
            "1. [76979871] Intro (62 seconds, nobody, 2023-05-01 10:20:30)"
        );
    }

    #[test]
    fn test_format_line_without_date() {
        let video = Video::from_value(json!({"uri": "/videos/1", "name": "x"})).unwrap();
        assert_eq!(
            format_line(3, &video),
            "3. [1] x (0 seconds, unknown, unknown date)"
        );
    }
}
