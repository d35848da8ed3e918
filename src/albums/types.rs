use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_SLUG_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub filename: String,
    pub path: String,
}

/// An album record. The slug is the key of the record in the directory store
/// and is filled in on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(skip)]
    pub slug: String,
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
}

impl Album {
    pub fn new(slug: impl Into<String>, title: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            owner_id: owner_id.into(),
            created_at: Utc::now(),
            access_password: None,
            thumbnail: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.access_password = Some(password.into());
        self
    }
}

/// Lower-case, hyphenated, `[a-z0-9-]` only, at most 50 characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_hyphen = false;

    for c in title.trim().chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_hyphen = true;
            continue;
        }
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            continue;
        }
        if pending_hyphen {
            slug.push('-');
            pending_hyphen = false;
        }
        slug.push(c);
    }

    slug.chars().take(MAX_SLUG_LEN).collect()
}
