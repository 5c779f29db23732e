use crate::{
    api::{
        handlers::repository::{PageFilter, PagedResource},
        models::jobs::Pagination,
    },
    errors::Result,
};
use tracing::debug;

/// Holds the currently displayed page of a collection and moves between pages.
///
/// Page numbers handed to `go_to` are clamped against the last pagination the
/// backend reported before anything is sent.
pub struct Paginator<R: PagedResource> {
    resource: R,
    filter: R::Filter,
    items: Vec<R::Item>,
    pagination: Option<Pagination>,
    loading: bool,
}

impl<R: PagedResource> Paginator<R> {
    pub fn new(resource: R, filter: R::Filter) -> Self {
        Self {
            resource,
            filter,
            items: Vec::new(),
            pagination: None,
            loading: false,
        }
    }

    pub fn items(&self) -> &[R::Item] {
        &self.items
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn filter(&self) -> &R::Filter {
        &self.filter
    }

    /// True while a fetch is in flight, and after one that was cancelled midway
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Fetch with a new filter, e.g. after the status filter changed
    pub async fn fetch(&mut self, filter: R::Filter) -> Result<&[R::Item]> {
        self.filter = filter;
        self.refetch().await
    }

    /// Re-fetch the current page with the current filter
    pub async fn refetch(&mut self) -> Result<&[R::Item]> {
        self.loading = true;
        let result = self.resource.fetch_page(&self.filter).await;
        self.loading = false;
        let page = result?;
        debug!(
            "Fetched page {} of {} ({} items)",
            page.pagination.page,
            page.pagination.pages,
            page.items.len()
        );
        self.items = page.items;
        self.pagination = Some(page.pagination);
        Ok(&self.items)
    }

    /// Jump to a page, clamped into `[1, pages]`
    pub async fn go_to(&mut self, page: i64) -> Result<&[R::Item]> {
        let target = match &self.pagination {
            Some(pagination) => pagination.clamp_page(page),
            None => page.clamp(1, i64::from(u32::MAX)) as u32,
        };
        self.filter = self.filter.clone().with_page(target);
        self.refetch().await
    }

    /// Move forward one page. Returns false without a request when already on the last page.
    pub async fn next_page(&mut self) -> Result<bool> {
        match self.pagination {
            Some(pagination) if pagination.has_next() => {
                self.go_to(i64::from(self.filter.page()) + 1).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Move back one page. Returns false without a request when already on the first page.
    pub async fn prev_page(&mut self) -> Result<bool> {
        match self.pagination {
            Some(pagination) if pagination.has_prev() => {
                self.go_to(i64::from(self.filter.page()) - 1).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
