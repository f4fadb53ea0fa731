//! Incremental "load more" pagination over an in-memory list

use crate::error::{LibraryError, Result};
use core_runtime::config::PaginationConfig;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Size of the visible prefix of a list.
///
/// The window starts at `initial` items and grows by `increment` on each
/// [`load_more`](Self::load_more), never past the list length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleWindow {
    initial: usize,
    increment: usize,
    visible: usize,
}

impl VisibleWindow {
    /// # Examples
    ///
    /// ```
    /// use core_library::VisibleWindow;
    ///
    /// let mut window = VisibleWindow::new(20, 15).unwrap();
    /// assert!(window.load_more(30));
    /// assert_eq!(window.visible_count(), 30);
    /// assert!(!window.has_more(30));
    /// ```
    pub fn new(initial: usize, increment: usize) -> Result<Self> {
        if initial == 0 {
            return Err(LibraryError::invalid("initial_load", "must be greater than zero"));
        }
        if increment == 0 {
            return Err(LibraryError::invalid("load_increment", "must be greater than zero"));
        }

        Ok(Self {
            initial,
            increment,
            visible: initial,
        })
    }

    pub fn from_config(config: &PaginationConfig) -> Result<Self> {
        Self::new(config.initial_load, config.load_increment)
    }

    pub fn visible_count(&self) -> usize {
        self.visible
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn increment(&self) -> usize {
        self.increment
    }

    /// Whether a list of `total` items extends past the window.
    pub fn has_more(&self, total: usize) -> bool {
        self.visible < total
    }

    /// Grows the window by one increment, clamped to `total`.
    ///
    /// Does nothing when there is nothing more to show. Returns whether the
    /// window changed.
    pub fn load_more(&mut self, total: usize) -> bool {
        if !self.has_more(total) {
            return false;
        }
        self.visible = self.visible.saturating_add(self.increment).min(total);
        true
    }

    /// Back to the first page.
    pub fn reset(&mut self) {
        self.visible = self.initial;
    }

    /// Indices of the visible items in a list of `total`.
    pub fn range(&self, total: usize) -> Range<usize> {
        0..self.visible.min(total)
    }
}

impl Default for VisibleWindow {
    fn default() -> Self {
        let config = PaginationConfig::default();
        Self {
            initial: config.initial_load,
            increment: config.load_increment,
            visible: config.initial_load,
        }
    }
}

/// Decides when scrolling near the end of a list should load more items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTrigger {
    threshold_px: u32,
}

impl ScrollTrigger {
    pub fn new(threshold_px: u32) -> Self {
        Self { threshold_px }
    }

    pub fn from_config(config: &PaginationConfig) -> Self {
        Self::new(config.infinite_scroll_threshold_px)
    }

    pub fn threshold_px(&self) -> u32 {
        self.threshold_px
    }

    /// Pixels between the bottom of the viewport and the end of the content.
    pub fn distance_to_end(scroll_offset_px: u32, viewport_px: u32, content_px: u32) -> u32 {
        content_px.saturating_sub(scroll_offset_px.saturating_add(viewport_px))
    }

    /// True within the threshold of the end, with more to show and no load
    /// already running.
    pub fn should_load_more(&self, distance_px: u32, is_loading: bool, has_more: bool) -> bool {
        has_more && !is_loading && distance_px <= self.threshold_px
    }
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::from_config(&PaginationConfig::default())
    }
}
