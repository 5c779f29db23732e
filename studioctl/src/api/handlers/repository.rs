use crate::{api::models::jobs::Pagination, errors::Result};
use async_trait::async_trait;

/// One page of a listing, with the pagination block the backend sent alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Page/limit query that a paginator can move between pages
pub trait PageFilter: Clone + Send + Sync {
    fn page(&self) -> u32;
    fn with_page(self, page: u32) -> Self;
}

/// A backend collection that is listed one page at a time
#[async_trait]
pub trait PagedResource: Send + Sync {
    type Item: Clone + Send + Sync;
    type Filter: PageFilter;

    async fn fetch_page(&self, filter: &Self::Filter) -> Result<Page<Self::Item>>;
}

/// Plain page/limit query for collections without extra filters
#[derive(Debug, Clone, Copy, serde::Serialize, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

impl PageQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }
}

impl PageFilter for PageQuery {
    fn page(&self) -> u32 {
        self.page
    }

    fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

impl PageFilter for crate::api::models::jobs::JobFilter {
    fn page(&self) -> u32 {
        self.page
    }

    fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

impl PageFilter for crate::api::models::transactions::TransactionFilter {
    fn page(&self) -> u32 {
        self.page
    }

    fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}
