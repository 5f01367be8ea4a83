use crate::error::{AppError, Result};
use crate::models::{Page, Rendition, Video};
use crate::token::Token;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// Media type Vimeo expects for API version 3.4.
pub const ACCEPT_VIMEO: &str = "application/vnd.vimeo.*+json;version=3.4";

/// Client for the Vimeo REST API.
///
/// Handles:
/// - Bearer authentication
/// - Pagination of `/me/videos`
/// - Single video lookups
/// - Turning error responses into `AppError::Api`
///
/// # Examples
///
/// ```no_run
/// use vimeo_downloader::{Token, VimeoClient};
///
/// async fn example() {
///     let client = VimeoClient::new("https://api.vimeo.com", Token::new("abc")).unwrap();
///     let videos = client.list_videos(100, None).await;
/// }
/// ```
pub struct VimeoClient {
    client: reqwest::Client,
    base: Url,
    token: Token,
}

impl VimeoClient {
    pub fn new(api_base: &str, token: Token) -> Result<Self> {
        if token.is_expired() {
            return Err(AppError::Auth(
                "The access token has expired. Please run the 'auth' command again.".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(api_base)?,
            token,
        })
    }

    /// The underlying HTTP client, shared with file downloads.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn get(&self, url: Url) -> Result<Response> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token.access_token)
            .header(reqwest::header::ACCEPT, ACCEPT_VIMEO)
            .send()
            .await?;
        Ok(response)
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let response = check_status(self.get(url).await?).await?;
        Ok(response.json().await?)
    }

    /// Fetches every video of the authenticated user in API order.
    ///
    /// Stops early once `limit` videos are collected.
    #[instrument(skip(self))]
    pub async fn list_videos(&self, page_size: usize, limit: Option<usize>) -> Result<Vec<Video>> {
        let mut url = self.url("/me/videos")?;
        url.query_pairs_mut()
            .append_pair("page", "1")
            .append_pair("per_page", &page_size.to_string());

        let mut videos = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let page: Page = serde_json::from_value(self.get_json(url).await?)?;
            debug!(count = page.data.len(), total = ?page.total, "received page");

            for value in page.data {
                videos.push(Video::from_value(value)?);
            }

            if limit.map_or(false, |l| videos.len() >= l) {
                break;
            }
            next = match page.paging.and_then(|p| p.next) {
                Some(path) if !path.is_empty() => Some(self.url(&path)?),
                _ => None,
            };
        }

        if let Some(limit) = limit {
            videos.truncate(limit);
        }
        Ok(videos)
    }

    /// Fetches a single video.
    ///
    /// # Errors
    /// `AppError::NotFound` when the API answers 404.
    #[instrument(skip(self))]
    pub async fn get_video(&self, video_id: &str) -> Result<Video> {
        let url = self.url(&format!("/videos/{}", video_id))?;
        let response = self.get(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(video_id.to_string()));
        }
        let value: Value = check_status(response).await?.json().await?;
        Video::from_value(value)
    }

    /// Asks the video's download endpoint for its renditions.
    ///
    /// Anything other than a JSON array yields no renditions.
    #[instrument(skip(self))]
    pub async fn get_download_links(&self, video_id: &str) -> Result<Vec<Rendition>> {
        let url = self.url(&format!("/videos/{}/download", video_id))?;
        match self.get_json(url).await? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Fetches only the rendition fields of a video, used when the listing
    /// did not include download links.
    #[instrument(skip(self))]
    pub async fn get_video_renditions(&self, video_id: &str) -> Result<Video> {
        let mut url = self.url(&format!("/videos/{}", video_id))?;
        url.query_pairs_mut()
            .append_pair("fields", "uri,name,download,files");
        let value = self.get_json(url).await?;
        Video::from_value(value)
    }
}

/// Maps a non-success response to `AppError::Api`, keeping the body.
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::Api {
        status: status.as_u16(),
        message: error_message(status, &body),
        body,
    })
}

/// Pulls a readable message out of a Vimeo error body.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("developer_message"))
                .or_else(|| v.get("error_description"))
        })
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_body() {
        let msg = error_message(
            StatusCode::FORBIDDEN,
            r#"{"error":"You don't have permission","developer_message":"scope"}"#,
        );
        assert_eq!(msg, "You don't have permission");
    }

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "<html>"), "Bad Gateway");
    }

    #[test]
    fn test_relative_next_page() {
        let client = VimeoClient::new("http://localhost:1234", Token::new("t")).unwrap();
        let url = client.url("/me/videos?page=2&per_page=3").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/me/videos?page=2&per_page=3");
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = Token::new("t").with_expires_in(Some(-10));
        assert!(matches!(
            VimeoClient::new("http://localhost:1234", token),
            Err(AppError::Auth(_))
        ));
    }
}
