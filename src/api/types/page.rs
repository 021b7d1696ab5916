//! Paged list responses

use serde::{Deserialize, Serialize};

use crate::domain::pagination::DEFAULT_PAGE_SIZE;
use crate::domain::{Page, Pageable};

/// `?page=&size=` query parameters, 1-based
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl PageQuery {
    pub fn pageable(&self) -> Pageable {
        Pageable::new(self.page.unwrap_or(1), self.size.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageInfo {
    pub current: usize,
    /// Items on this page
    pub size: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total_elements: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub data: Vec<T>,
    pub page: PageInfo,
}

impl<T> PagedResult<T> {
    /// Map a domain page to its response DTOs
    pub fn from_page<E>(page: Page<E>, f: impl FnMut(E) -> T) -> Self {
        let info = PageInfo {
            current: page.page_number,
            size: page.content.len(),
            per_page: page.page_size,
            total_pages: page.total_pages(),
            total_elements: page.total_elements,
        };

        Self {
            data: page.content.into_iter().map(f).collect(),
            page: info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_clamps() {
        assert_eq!(PageQuery::default().pageable(), Pageable::default());

        let query = PageQuery {
            page: Some(0),
            size: Some(1000),
        };
        assert_eq!(query.pageable(), Pageable::new(1, 100));
    }

    #[test]
    fn test_paged_result() {
        let page = Page::of((1..=25).collect::<Vec<u32>>(), Pageable::new(3, 10));
        let result = PagedResult::from_page(page, |n| n.to_string());

        assert_eq!(result.data, vec!["21", "22", "23", "24", "25"]);
        assert_eq!(
            result.page,
            PageInfo {
                current: 3,
                size: 5,
                per_page: 10,
                total_pages: 3,
                total_elements: 25,
            }
        );
    }
}
