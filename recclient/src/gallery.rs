//! Client-side pagination over the full recordings list.

use api::recording::Recording;
use chrono::Local;
use tracing::warn;

use crate::client::ApiClient;
use crate::format::human_size;

pub const DEFAULT_PAGE_SIZE: usize = 3;

/// `ceil(count / page_size)`
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1))
}

#[derive(Debug, Clone)]
pub struct Gallery {
    recordings: Vec<Recording>,
    page: usize,
    page_size: usize,
    loading: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryItem {
    pub title: String,
    pub size: String,
    pub created: String,
    pub stream_url: String,
    pub recording: Recording,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub items: Vec<GalleryItem>,
}

impl Default for Gallery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Gallery {
    pub fn new(page_size: usize) -> Self {
        Self {
            recordings: Vec::new(),
            page: 1,
            page_size: page_size.max(1),
            loading: false,
            error: None,
        }
    }

    /// Fetch the whole list again. On failure the previous list is kept.
    pub async fn refresh(&mut self, client: &ApiClient) {
        self.loading = true;
        match client.list().await {
            Ok(recordings) => {
                self.set_recordings(recordings);
                self.error = None;
            }
            Err(e) => {
                warn!("Failed to fetch recordings: {}", e);
                self.error = Some(e.to_string());
            }
        }
        self.loading = false;
    }

    pub fn set_recordings(&mut self, recordings: Vec<Recording>) {
        self.recordings = recordings;
        self.page = self.page();
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.recordings.len(), self.page_size)
    }

    /// Current page clamped against the live list length
    pub fn page(&self) -> usize {
        self.page.clamp(1, self.total_pages().max(1))
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
        self.page = self.page();
    }

    pub fn next(&mut self) {
        if self.page() < self.total_pages() {
            self.page = self.page() + 1;
        }
    }

    pub fn prev(&mut self) {
        if self.page() > 1 {
            self.page = self.page() - 1;
        }
    }

    pub fn view(&self, base_url: &str) -> PageView {
        let page = self.page();
        let total = self.total_pages();
        let start = (page - 1) * self.page_size;
        let items = self
            .recordings
            .iter()
            .enumerate()
            .skip(start)
            .take(self.page_size)
            .map(|(i, r)| GalleryItem {
                title: format!("Recording {}", i + 1),
                size: human_size(r.size.max(0) as u64),
                created: r
                    .created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                stream_url: format!("{}{}", base_url, r.url),
                recording: r.clone(),
            })
            .collect();

        PageView {
            page,
            total_pages: total,
            has_prev: page > 1,
            has_next: page < total,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn recordings(n: i64) -> Vec<Recording> {
        (1..=n)
            .rev()
            .map(|id| {
                Recording::new(
                    id,
                    format!("{id}-rec.webm"),
                    id * 1024,
                    Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 3), 0);
        assert_eq!(total_pages(1, 3), 1);
        assert_eq!(total_pages(3, 3), 1);
        assert_eq!(total_pages(4, 3), 2);
        assert_eq!(total_pages(7, 3), 3);
    }

    #[test]
    fn test_three_records_single_page() {
        let mut gallery = Gallery::new(3);
        gallery.set_recordings(recordings(3));

        let view = gallery.view("http://localhost:3001");
        assert_eq!(view.page, 1);
        assert_eq!(view.total_pages, 1);
        assert!(!view.has_prev);
        assert!(!view.has_next);
        let titles: Vec<_> = view.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["Recording 1", "Recording 2", "Recording 3"]);
        assert_eq!(view.items[0].size, "3.0 KB");
        assert_eq!(
            view.items[0].stream_url,
            "http://localhost:3001/uploads/3-rec.webm"
        );
    }

    #[test]
    fn test_last_page_holds_remainder() {
        let mut gallery = Gallery::new(3);
        gallery.set_recordings(recordings(7));

        gallery.next();
        gallery.next();
        let view = gallery.view("");
        assert_eq!(view.page, 3);
        assert!(view.has_prev);
        assert!(!view.has_next);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].title, "Recording 7");

        // next at the boundary stays put
        gallery.next();
        assert_eq!(gallery.page(), 3);

        gallery.prev();
        gallery.prev();
        gallery.prev();
        assert_eq!(gallery.page(), 1);
        assert_eq!(gallery.view("").items[0].title, "Recording 1");
    }

    #[test]
    fn test_page_clamped_when_list_shrinks() {
        let mut gallery = Gallery::new(3);
        gallery.set_recordings(recordings(9));
        gallery.set_page(3);
        assert_eq!(gallery.page(), 3);

        gallery.set_recordings(recordings(4));
        assert_eq!(gallery.page(), 2);
        assert_eq!(gallery.view("").items.len(), 1);

        gallery.set_recordings(Vec::new());
        let view = gallery.view("");
        assert_eq!(view.page, 1);
        assert_eq!(view.total_pages, 0);
        assert!(!view.has_prev);
        assert!(!view.has_next);
        assert!(view.items.is_empty());
    }
}
