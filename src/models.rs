use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Height targeted by [`SelectionPolicy::PreferHd`].
pub const HD_HEIGHT: u32 = 720;

/// A video as returned by the `/me/videos` and `/videos/{id}` endpoints.
///
/// Only the fields the tool uses are typed; the full object is kept in
/// `raw` so debug mode can print exactly what the API sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub privacy: Option<Privacy>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub download: Vec<Rendition>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub files: Vec<Rendition>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Privacy {
    #[serde(default)]
    pub view: Option<String>,
}

/// One encoded version of a video that may be downloadable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub rendition: Option<String>,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub public_name: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Pagination cursors; `next` is a path relative to the API base.
#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

fn nullable_list<'de, D>(deserializer: D) -> std::result::Result<Vec<Rendition>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Rendition>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Video {
    /// Parses a video while keeping the raw JSON around.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut video: Video = serde_json::from_value(value.clone())?;
        video.raw = value;
        Ok(video)
    }

    /// The numeric ID, taken from the last segment of `uri`.
    pub fn id(&self) -> &str {
        self.uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    pub fn privacy_view(&self) -> &str {
        self.privacy
            .as_ref()
            .and_then(|p| p.view.as_deref())
            .unwrap_or("unknown")
    }

    /// Renditions from `download` first, then `files`, skipping duplicates
    /// of the same link.
    pub fn renditions(&self) -> Vec<Rendition> {
        let mut all: Vec<Rendition> = Vec::new();
        for rendition in self.download.iter().chain(self.files.iter()) {
            let duplicate = rendition.link.is_some()
                && all.iter().any(|r| r.link == rendition.link);
            if !duplicate {
                all.push(rendition.clone());
            }
        }
        all
    }

    pub fn best_rendition(&self, policy: SelectionPolicy) -> Option<Rendition> {
        select_best(&self.renditions(), policy).cloned()
    }

    /// A file name safe on every platform: `{name}_{id}.{ext}`.
    pub fn file_name(&self, rendition: &Rendition) -> String {
        let mut name = sanitize_file_name(&self.name);
        if name.trim().is_empty() {
            name = String::from("video");
        }
        format!("{}_{}.{}", name, self.id(), rendition.extension())
    }
}

impl Rendition {
    /// Whether the rendition exposes a URL that can be fetched directly.
    pub fn has_link(&self) -> bool {
        self.link
            .as_deref()
            .map_or(false, |l| l.starts_with("http://") || l.starts_with("https://"))
    }

    pub fn pixels(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }

    pub fn label(&self) -> &str {
        self.rendition
            .as_deref()
            .or(self.public_name.as_deref())
            .or(self.quality.as_deref())
            .unwrap_or("unknown")
    }

    /// File extension derived from the MIME subtype (`video/mp4` -> `mp4`).
    pub fn extension(&self) -> String {
        self.mime_type
            .as_deref()
            .and_then(|t| t.split_once('/'))
            .map(|(_, sub)| sub.split(';').next().unwrap_or(sub).trim())
            .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| String::from("mp4"))
    }
}

/// How the downloader picks a rendition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Largest declared size among linked renditions.
    #[default]
    Largest,
    /// Height closest to 720p, falling back to `Largest`.
    PreferHd,
}

/// Picks the best rendition that has a direct link.
///
/// Ties keep the first rendition in API order.
pub fn select_best(renditions: &[Rendition], policy: SelectionPolicy) -> Option<&Rendition> {
    let linked = renditions.iter().filter(|r| r.has_link());

    if policy == SelectionPolicy::PreferHd {
        let closest = linked
            .clone()
            .filter(|r| r.height.unwrap_or(0) > 0)
            .min_by_key(|r| r.height.unwrap_or(0).abs_diff(HD_HEIGHT));
        if closest.is_some() {
            return closest;
        }
    }

    let rank = |r: &Rendition| (r.size.unwrap_or(0), r.pixels());
    linked.fold(None, |best: Option<&Rendition>, candidate| match best {
        Some(b) if rank(b) >= rank(candidate) => Some(b),
        _ => Some(candidate),
    })
}

/// Keeps alphanumerics and ` ._-`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
