//! Paging primitives shared by list operations

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// A 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub page: usize,
    pub size: usize,
}

impl Default for Pageable {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pageable {
    /// Build a page request, clamping out-of-range values
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Saturates for absurd page numbers, which then yield an empty page
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }
}

/// One page of results plus the size of the full result set
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: usize,
    pub page_size: usize,
    pub total_elements: usize,
}

impl<T> Page<T> {
    /// Cut the page described by `pageable` out of an already sorted result set
    pub fn of(items: Vec<T>, pageable: Pageable) -> Self {
        let total_elements = items.len();
        let content = items
            .into_iter()
            .skip(pageable.offset())
            .take(pageable.size)
            .collect();

        Self {
            content,
            page_number: pageable.page,
            page_size: pageable.size,
            total_elements,
        }
    }

    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.page_size)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_elements: self.total_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pageable_clamps() {
        let pageable = Pageable::new(0, 0);
        assert_eq!(pageable.page, 1);
        assert_eq!(pageable.size, 1);

        let pageable = Pageable::new(3, 1000);
        assert_eq!(pageable.size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_of_middle_page() {
        let page = Page::of((1..=25).collect::<Vec<_>>(), Pageable::new(2, 10));

        assert_eq!(page.content, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total_elements, 25);
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_huge_page_number_is_empty_not_a_panic() {
        let pageable = Pageable::new(usize::MAX, MAX_PAGE_SIZE);
        assert_eq!(pageable.offset(), usize::MAX);

        let page = Page::of(vec![1, 2, 3], pageable);
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 3);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let page = Page::of(vec![1, 2, 3], Pageable::new(5, 10));

        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages(), 1);
    }

    #[test]
    fn test_page_map() {
        let page = Page::of(vec![1, 2], Pageable::default()).map(|n| n * 10);
        assert_eq!(page.content, vec![10, 20]);
        assert_eq!(page.page_number, 1);
    }
}
