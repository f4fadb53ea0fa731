//! Client-side search over loaded podcasts

use core_catalog::{Podcast, PodcastDetail};

/// Something that can be matched by a search term.
pub trait Searchable {
    fn name(&self) -> &str;
    fn artist(&self) -> &str;
}

impl Searchable for Podcast {
    fn name(&self) -> &str {
        &self.name
    }

    fn artist(&self) -> &str {
        &self.artist
    }
}

impl Searchable for PodcastDetail {
    fn name(&self) -> &str {
        &self.name
    }

    fn artist(&self) -> &str {
        &self.artist
    }
}

/// Case-insensitive substring match against name or artist.
///
/// A blank or whitespace-only term matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    needle: Option<String>,
}

impl SearchFilter {
    /// Whitespace only decides blankness; a non-blank term is matched as
    /// given, surrounding spaces included.
    pub fn new(term: &str) -> Self {
        Self {
            needle: (!term.trim().is_empty()).then(|| term.to_lowercase()),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.needle.is_none()
    }

    pub fn matches<T: Searchable + ?Sized>(&self, item: &T) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => {
                item.name().to_lowercase().contains(needle)
                    || item.artist().to_lowercase().contains(needle)
            }
        }
    }

    /// Indices of the matching items, in input order.
    pub fn matching_indices<T: Searchable>(&self, items: &[T]) -> Vec<usize> {
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.matches(*item))
            .map(|(index, _)| index)
            .collect()
    }
}

/// Items whose name or artist contains `term`, in input order.
pub fn filter_podcasts<'a, T: Searchable>(items: &'a [T], term: &str) -> Vec<&'a T> {
    let filter = SearchFilter::new(term);
    items.iter().filter(|item| filter.matches(*item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn podcast(id: &str, name: &str, artist: &str) -> Podcast {
        Podcast {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            summary: String::new(),
            image: String::new(),
            track_count: None,
        }
    }

    fn catalog() -> Vec<Podcast> {
        vec![
            podcast("1", "The Joe Budden Podcast", "The Joe Budden Network"),
            podcast("2", "Song Exploder", "Hrishikesh Hirway"),
            podcast("3", "Broken Record", "Pushkin Industries"),
            podcast("4", "Switched on Pop", "Vulture"),
        ]
    }

    #[test]
    fn test_blank_term_returns_everything_in_order() {
        let podcasts = catalog();
        for term in ["", " ", "\t\n  "] {
            let filtered = filter_podcasts(&podcasts, term);
            let ids: Vec<&str> = filtered.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, ["1", "2", "3", "4"]);
        }
        assert!(SearchFilter::new("   ").is_blank());
    }

    #[test]
    fn test_matches_name_or_artist_case_insensitively() {
        let podcasts = catalog();

        let by_name: Vec<&str> = filter_podcasts(&podcasts, "EXPLODER")
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(by_name, ["2"]);

        let by_artist: Vec<&str> = filter_podcasts(&podcasts, "pushkin")
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(by_artist, ["3"]);

        assert!(filter_podcasts(&podcasts, "no such show").is_empty());
    }

    #[test]
    fn test_surrounding_whitespace_is_part_of_the_term() {
        let podcasts = catalog();

        // "Switched on Pop" ends in "pop", not "pop "
        assert!(filter_podcasts(&podcasts, "pop ").is_empty());
        assert!(filter_podcasts(&podcasts, "  pop").is_empty());

        let kept: Vec<&str> = filter_podcasts(&podcasts, "on pop")
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(kept, ["4"]);

        for podcast in filter_podcasts(&podcasts, " record") {
            assert!(
                podcast.name.to_lowercase().contains(" record")
                    || podcast.artist.to_lowercase().contains(" record")
            );
        }
    }

    #[test]
    fn test_every_kept_item_matches_and_no_dropped_item_does() {
        let podcasts = catalog();
        let filter = SearchFilter::new("o");
        let kept = filter.matching_indices(&podcasts);

        for (index, podcast) in podcasts.iter().enumerate() {
            let matches = podcast.name.to_lowercase().contains('o')
                || podcast.artist.to_lowercase().contains('o');
            assert_eq!(kept.contains(&index), matches, "{}", podcast.name);
        }
    }
}
