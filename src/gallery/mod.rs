// Gallery presentation state - which photo set a viewer is looking at
use std::fmt::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryMode {
    Full,
    Matched,
}

/// Outcome of a match query as the viewer should hear about it. A failed
/// query and an empty result are different messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFeedback {
    Matched(usize),
    NoMatches,
    Failed(String),
}

impl MatchFeedback {
    pub fn message(&self) -> String {
        match self {
            MatchFeedback::Matched(1) => "Found 1 photo of you".to_string(),
            MatchFeedback::Matched(count) => format!("Found {} photos of you", count),
            MatchFeedback::NoMatches => "No matching photos found".to_string(),
            MatchFeedback::Failed(reason) => format!("Face search failed: {}", reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MatchFeedback::Failed(_))
    }
}

/// Per-viewer gallery state.
///
/// Starts on the full album. A successful non-empty match switches to the
/// matched subset; only [`GallerySession::show_full_album`] switches back.
/// The preview is independent of the mode and never changes either set.
#[derive(Debug, Clone)]
pub struct GallerySession {
    album_id: String,
    mode: GalleryMode,
    full_set: Vec<String>,
    matched_set: Vec<String>,
    active_preview: Option<String>,
}

impl GallerySession {
    pub fn new(album_id: impl Into<String>, full_set: Vec<String>) -> Self {
        Self {
            album_id: album_id.into(),
            mode: GalleryMode::Full,
            full_set,
            matched_set: Vec::new(),
            active_preview: None,
        }
    }

    pub fn album_id(&self) -> &str {
        &self.album_id
    }

    pub fn mode(&self) -> GalleryMode {
        self.mode
    }

    pub fn full_set(&self) -> &[String] {
        &self.full_set
    }

    pub fn matched_set(&self) -> &[String] {
        &self.matched_set
    }

    pub fn active_preview(&self) -> Option<&str> {
        self.active_preview.as_deref()
    }

    /// The filenames currently on screen.
    pub fn visible(&self) -> &[String] {
        match self.mode {
            GalleryMode::Full => &self.full_set,
            GalleryMode::Matched => &self.matched_set,
        }
    }

    /// Applies the result of a match query. Only a non-empty success changes
    /// the state.
    pub fn apply_match<E: Display>(&mut self, result: Result<Vec<String>, E>) -> MatchFeedback {
        let references = match result {
            Ok(references) => references,
            Err(e) => {
                warn!(album_id = %self.album_id, "Match query failed: {}", e);
                return MatchFeedback::Failed(e.to_string());
            }
        };

        let matched: Vec<String> = references
            .iter()
            .filter_map(|reference| self.filename_of(reference))
            .filter(|filename| self.full_set.contains(filename))
            .collect();

        if matched.is_empty() {
            return MatchFeedback::NoMatches;
        }

        debug!(album_id = %self.album_id, matches = matched.len(), "Showing matched photos");
        let count = matched.len();
        self.matched_set = matched;
        self.mode = GalleryMode::Matched;
        MatchFeedback::Matched(count)
    }

    pub fn show_full_album(&mut self) {
        self.mode = GalleryMode::Full;
        self.matched_set.clear();
    }

    /// Replaces the album listing, typically once after an upload batch.
    /// The mode is kept.
    pub fn refresh_full_set(&mut self, photos: Vec<String>) {
        self.full_set = photos;
        let full_set = &self.full_set;
        self.matched_set.retain(|filename| full_set.contains(filename));
    }

    /// Opens the enlarged view of a photo. Unknown photos are ignored.
    pub fn open_preview(&mut self, filename: &str) -> bool {
        if !self.full_set.iter().any(|f| f == filename) {
            return false;
        }
        self.active_preview = Some(filename.to_string());
        true
    }

    pub fn close_preview(&mut self) {
        self.active_preview = None;
    }

    /// `(album_id, filename)` of the previewed photo, for the download action.
    pub fn download_target(&self) -> Option<(&str, &str)> {
        self.active_preview
            .as_deref()
            .map(|filename| (self.album_id.as_str(), filename))
    }

    fn filename_of(&self, reference: &str) -> Option<String> {
        match reference.split_once('/') {
            Some((album, filename)) if album == self.album_id => Some(filename.to_string()),
            Some(_) => None,
            None => Some(reference.to_string()),
        }
    }
}
