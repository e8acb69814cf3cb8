use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub program_id: Uuid,
    pub title: String,
    pub description: String,
    pub week_number: u32,
    pub estimated_minutes: u32,
    pub practice_type: String,
    pub content: SessionContent,
    pub background_media: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Timer,
    Link,
    Audio,
    Video,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Link => "link",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "timer" => Some(Self::Timer),
            "link" => Some(Self::Link),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Session content. The payload shape is tied to the content type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionContent {
    Timer { minutes: u32 },
    Link { url: String },
    Audio { media: String },
    Video { media: String },
}

impl SessionContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Timer { .. } => ContentType::Timer,
            Self::Link { .. } => ContentType::Link,
            Self::Audio { .. } => ContentType::Audio,
            Self::Video { .. } => ContentType::Video,
        }
    }

    /// Payload as stored next to the content type column.
    pub fn payload(&self) -> String {
        match self {
            Self::Timer { minutes } => minutes.to_string(),
            Self::Link { url } => url.clone(),
            Self::Audio { media } | Self::Video { media } => media.clone(),
        }
    }

    /// Rebuilds content from its stored (type, payload) pair.
    pub fn from_parts(content_type: ContentType, payload: &str) -> CoreResult<Self> {
        let content = match content_type {
            ContentType::Timer => Self::Timer {
                minutes: payload.trim().parse().map_err(|_| {
                    CoreError::validation(format!(
                        "timer content needs a whole number of minutes, got {payload:?}"
                    ))
                })?,
            },
            ContentType::Link => Self::Link {
                url: payload.to_string(),
            },
            ContentType::Audio => Self::Audio {
                media: payload.to_string(),
            },
            ContentType::Video => Self::Video {
                media: payload.to_string(),
            },
        };
        content.validate()?;
        Ok(content)
    }

    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Self::Timer { minutes } if *minutes == 0 => Err(CoreError::validation(
                "timer content needs a positive duration",
            )),
            Self::Timer { .. } => Ok(()),
            Self::Link { url } => {
                let parsed = Url::parse(url)
                    .map_err(|e| CoreError::validation(format!("invalid link {url:?}: {e}")))?;
                match parsed.scheme() {
                    "http" | "https" => Ok(()),
                    other => Err(CoreError::validation(format!(
                        "link must be http or https, got {other}"
                    ))),
                }
            }
            Self::Audio { media } | Self::Video { media } => {
                if media.trim().is_empty() {
                    Err(CoreError::validation(format!(
                        "{} content needs a stored media reference",
                        self.content_type().as_str()
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub week_number: u32,
    pub estimated_minutes: u32,
    pub practice_type: String,
    pub content: SessionContent,
    pub background_media: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSessionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub week_number: Option<u32>,
    pub estimated_minutes: Option<u32>,
    pub practice_type: Option<String>,
    pub content: Option<SessionContent>,
    pub background_media: Option<String>,
}

/// A session as seen by one participant right now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAvailability {
    pub session: Session,
    pub available: bool,
    pub journaled: bool,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub reason: String,
}
