//! Filtered, paginated view over the loaded podcasts

use crate::error::Result;
use crate::filter::{SearchFilter, Searchable};
use crate::pagination::{ScrollTrigger, VisibleWindow};
use core_catalog::Podcast;
use core_runtime::config::PaginationConfig;
use tracing::debug;

/// List state: all items, the search term and the visible window.
///
/// Derived views ([`filtered`](Self::filtered), [`visible`](Self::visible))
/// are computed from that state. A new search term always starts again from
/// the first page; replacing the items keeps the current window.
#[derive(Debug, Clone)]
pub struct PodcastList<T = Podcast> {
    items: Vec<T>,
    search_term: String,
    filter: SearchFilter,
    matching: Vec<usize>,
    window: VisibleWindow,
    trigger: ScrollTrigger,
}

impl<T: Searchable> PodcastList<T> {
    pub fn new(window: VisibleWindow, trigger: ScrollTrigger) -> Self {
        Self {
            items: Vec::new(),
            search_term: String::new(),
            filter: SearchFilter::default(),
            matching: Vec::new(),
            window,
            trigger,
        }
    }

    pub fn from_config(config: &PaginationConfig) -> Result<Self> {
        Ok(Self::new(
            VisibleWindow::from_config(config)?,
            ScrollTrigger::from_config(config),
        ))
    }

    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.set_items(items);
        self
    }

    /// Replaces the underlying items.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.refilter();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Sets the search term and returns to the first page.
    ///
    /// Setting the current term again changes nothing.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        let term = term.into();
        if term == self.search_term {
            return;
        }

        self.filter = SearchFilter::new(&term);
        self.search_term = term;
        self.window.reset();
        self.refilter();
        debug!(
            search_term = %self.search_term,
            matches = self.matching.len(),
            "Search term changed"
        );
    }

    fn refilter(&mut self) {
        self.matching = self.filter.matching_indices(&self.items);
    }

    pub fn filtered(&self) -> Vec<&T> {
        self.matching.iter().map(|&index| &self.items[index]).collect()
    }

    pub fn visible(&self) -> Vec<&T> {
        self.matching[self.window.range(self.matching.len())]
            .iter()
            .map(|&index| &self.items[index])
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        self.window.visible_count()
    }

    /// Number of items currently shown.
    pub fn podcast_count(&self) -> usize {
        self.window.range(self.matching.len()).len()
    }

    pub fn total_filtered_count(&self) -> usize {
        self.matching.len()
    }

    pub fn has_more(&self) -> bool {
        self.window.has_more(self.matching.len())
    }

    /// Shows one more increment; a no-op when everything is shown.
    pub fn load_more(&mut self) -> bool {
        self.window.load_more(self.matching.len())
    }

    /// Loads more when a scroll ends within the trigger threshold.
    ///
    /// Returns whether more items were loaded.
    pub fn on_scroll(&mut self, distance_to_end_px: u32, is_loading: bool) -> bool {
        if self
            .trigger
            .should_load_more(distance_to_end_px, is_loading, self.has_more())
        {
            self.load_more()
        } else {
            false
        }
    }
}

impl<T: Searchable> Default for PodcastList<T> {
    fn default() -> Self {
        Self::new(VisibleWindow::default(), ScrollTrigger::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn podcasts(count: usize) -> Vec<Podcast> {
        (0..count)
            .map(|i| Podcast {
                id: i.to_string(),
                name: if i % 2 == 0 {
                    format!("Daily News {}", i)
                } else {
                    format!("Comedy Hour {}", i)
                },
                artist: format!("Network {}", i),
                summary: String::new(),
                image: String::new(),
                track_count: None,
            })
            .collect()
    }

    fn list(count: usize) -> PodcastList {
        PodcastList::new(VisibleWindow::new(20, 15).unwrap(), ScrollTrigger::new(200))
            .with_items(podcasts(count))
    }

    #[test]
    fn test_initial_view() {
        let list = list(100);
        assert_eq!(list.podcast_count(), 20);
        assert_eq!(list.total_filtered_count(), 100);
        assert!(list.has_more());
        assert_eq!(list.visible()[19].id, "19");
    }

    #[test]
    fn test_search_resets_window() {
        let mut list = list(100);
        list.load_more();
        list.load_more();
        assert_eq!(list.visible_count(), 50);

        list.set_search_term("daily");
        assert_eq!(list.visible_count(), 20);
        assert_eq!(list.total_filtered_count(), 50);
        assert!(list.visible().iter().all(|p| p.name.starts_with("Daily")));

        list.load_more();
        list.set_search_term("");
        assert_eq!(list.visible_count(), 20);
        assert_eq!(list.total_filtered_count(), 100);
    }

    #[test]
    fn test_small_result_has_no_more() {
        let mut list = list(100);
        list.set_search_term("Comedy Hour 1");
        // 1, 11, 13, 15, 17, 19
        assert_eq!(list.total_filtered_count(), 6);
        assert_eq!(list.podcast_count(), 6);
        assert!(!list.has_more());
        assert!(!list.load_more());
        assert_eq!(list.visible_count(), 20);
    }

    #[test]
    fn test_scroll_loads_until_exhausted() {
        let mut list = list(40);
        assert!(!list.on_scroll(500, false));
        assert!(!list.on_scroll(100, true));
        assert!(list.on_scroll(100, false));
        assert_eq!(list.podcast_count(), 35);
        assert!(list.on_scroll(0, false));
        assert_eq!(list.podcast_count(), 40);
        assert!(!list.on_scroll(0, false));
    }

    #[test]
    fn test_replacing_items_keeps_window_and_term() {
        let mut list = list(100);
        list.set_search_term("news");
        list.load_more();

        list.set_items(podcasts(10));
        assert_eq!(list.search_term(), "news");
        assert_eq!(list.visible_count(), 35);
        assert_eq!(list.podcast_count(), 5);
        assert_eq!(list.filtered().len(), 5);
    }
}
