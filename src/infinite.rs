//! # Infinite List Controller
//!
//! Keeps an ordered, de-duplicated list of items that is filled page by page, for
//! infinite-scroll style UIs. Every item is tagged with the page that produced it.
//!
//! | operation | request | merge policy |
//! |---|---|---|
//! | [`fetch_data`](InfiniteQuery::fetch_data) | page 1 | replace the list |
//! | [`fetch_next_page`](InfiniteQuery::fetch_next_page) | `page_index + 1` | append items not already present |
//! | [`refresh_page`](InfiniteQuery::refresh_page) | page 1, enlarged page size | prepend items not already present |
//! | [`fetch_exact_page`](InfiniteQuery::fetch_exact_page) | page `n` | overwrite the slice of page `n`, then de-duplicate |
//! | [`remove_item_by_id`](InfiniteQuery::remove_item_by_id) | none | drop matching items |
//!
//! `has_next_page` is never an input. After each of these operations it is recomputed as
//! `items.len() < total || last_page_len == page_size`, from the last response's `total`
//! and the length of the last page fetched.
//!
//! `page_index` only advances when a next-page fetch succeeds; a failed one leaves it where
//! it was so a retry asks for the same page again.
//!
//! Operations are not serialized against each other. If a next-page fetch and a refresh
//! overlap, whichever settles last writes its flags last.

use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, ops::Deref, sync::Arc};
use tracing::debug;

use crate::{
    callbacks::{Callbacks, handle_error, handle_success},
    errors::QueryError,
    filter::Filter,
    platform::{DEFAULT_PAGE_SIZE, FIRST_PAGE, REFRESH_PAGE_SIZE},
    store::{Store, Subscription},
    utils::{Identifiable, find_difference_items, same_identity, uniq_by_identity},
};

/// What the fetcher is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page_index: u32,
    pub page_size: usize,
}

/// One page as returned by the fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Total number of items on the server for the current filter
    #[serde(default)]
    pub total: u64,
    /// The page the server says it returned
    #[serde(default)]
    pub page_index: Option<u32>,
}

impl<T> PageResponse<T> {
    pub fn new(data: Vec<T>, total: u64) -> Self {
        Self {
            data,
            total,
            page_index: None,
        }
    }

    pub fn with_page_index(mut self, page_index: u32) -> Self {
        self.page_index = Some(page_index);
        self
    }
}

/// An item together with the page it was fetched from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedItem<T> {
    pub belongs_to_page: u32,
    #[serde(flatten)]
    pub item: T,
}

impl<T> Deref for PagedItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Identifiable> Identifiable for PagedItem<T> {
    type Id = T::Id;

    fn id(&self) -> Option<T::Id> {
        self.item.id()
    }
}

fn tag<T>(items: Vec<T>, page: u32) -> Vec<PagedItem<T>> {
    items
        .into_iter()
        .map(|item| PagedItem {
            belongs_to_page: page,
            item,
        })
        .collect()
}

/// Sizes used by the controller. Both are at least 1 once applied; a 0 is raised to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfiniteQueryOptions {
    pub page_size: usize,
    pub refresh_page_size: usize,
}

impl Default for InfiniteQueryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh_page_size: REFRESH_PAGE_SIZE,
        }
    }
}

impl InfiniteQueryOptions {
    fn normalized(self) -> Self {
        Self {
            page_size: self.page_size.max(1),
            refresh_page_size: self.refresh_page_size.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteState<T, F> {
    pub items: Vec<PagedItem<T>>,
    pub filter: F,
    /// Last page successfully appended; 1 after a reload
    pub page_index: u32,
    pub page_size: usize,
    pub has_next_page: bool,
    /// `total` of the last response
    pub total: u64,
    /// Number of items in the last page fetched by reload, next-page or exact-page
    pub last_page_len: usize,
    pub is_loading: bool,
    pub is_loaded: bool,
    pub is_refreshing: bool,
    pub is_fetching_next_page: bool,
    pub is_fetching_exact_page: bool,
    pub error: Option<QueryError>,
}

impl<T, F: Default> Default for InfiniteState<T, F> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            filter: F::default(),
            page_index: FIRST_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            has_next_page: false,
            total: 0,
            last_page_len: 0,
            // Nothing loaded yet: the first render should show a loader.
            is_loading: true,
            is_loaded: false,
            is_refreshing: false,
            is_fetching_next_page: false,
            is_fetching_exact_page: false,
            error: None,
        }
    }
}

impl<T, F> InfiniteState<T, F> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The bare items, without page tags
    pub fn data(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|paged| &paged.item)
    }

    fn record_page(&mut self, total: u64, page_len: usize) {
        self.total = total;
        self.last_page_len = page_len;
        self.recompute_has_next_page();
    }

    fn recompute_has_next_page(&mut self) {
        self.has_next_page =
            (self.items.len() as u64) < self.total || self.last_page_len == self.page_size;
    }
}

/// Fetches one page for a filter
pub type PageFetcher<T, F> = Arc<
    dyn Fn(F, PageRequest) -> BoxFuture<'static, Result<PageResponse<T>, QueryError>>
        + Send
        + Sync,
>;

/// Infinite-scroll list controller. Clones share state, fetcher and handlers.
pub struct InfiniteQuery<T, F> {
    store: Store<InfiniteState<T, F>>,
    fetcher: PageFetcher<T, F>,
    options: InfiniteQueryOptions,
    callbacks: Callbacks<PageResponse<T>>,
}

impl<T, F> Clone for InfiniteQuery<T, F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            options: self.options,
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<T, F> fmt::Debug for InfiniteQuery<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteQuery")
            .field("options", &self.options)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

impl<T, F> InfiniteQuery<T, F>
where
    T: Identifiable + Clone + Send + Sync + 'static,
    F: Filter,
{
    pub fn new<Fetch, Fut, E>(fetcher: Fetch) -> Self
    where
        Fetch: Fn(F, PageRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageResponse<T>, E>> + Send + 'static,
        E: Into<QueryError> + 'static,
    {
        let fetcher: PageFetcher<T, F> = Arc::new(move |filter, request| {
            fetcher(filter, request)
                .map(|result| result.map_err(Into::into))
                .boxed()
        });
        Self {
            store: Store::default(),
            fetcher,
            options: InfiniteQueryOptions::default(),
            callbacks: Callbacks::default(),
        }
    }

    pub fn with_options(mut self, options: InfiniteQueryOptions) -> Self {
        let options = options.normalized();
        self.options = options;
        self.store.set(|s| {
            s.page_size = options.page_size;
        });
        self
    }

    /// Container-level handlers, used when a call brings none of its own
    pub fn with_callbacks(mut self, callbacks: Callbacks<PageResponse<T>>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn state(&self) -> InfiniteState<T, F> {
        self.store.get()
    }

    pub fn store(&self) -> &Store<InfiniteState<T, F>> {
        &self.store
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&InfiniteState<T, F>, &InfiniteState<T, F>) + Send + Sync + 'static,
    ) -> Subscription<InfiniteState<T, F>> {
        self.store.subscribe(listener)
    }

    /// Shallow-merge `patch` into the filter. Does not fetch.
    pub fn set_filter(&self, patch: F) {
        self.store.set(|s| s.filter.merge(patch));
    }

    /// Replace the filter. Does not fetch.
    pub fn reset_filter(&self, filter: F) {
        self.store.set(|s| s.filter = filter);
    }

    pub fn set_data(&self, items: Vec<PagedItem<T>>) {
        self.store.set(|s| {
            s.items = uniq_by_identity(items);
            s.recompute_has_next_page();
        });
    }

    pub fn set_page_index(&self, page_index: u32) {
        self.store.set(|s| s.page_index = page_index.max(FIRST_PAGE));
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.store.set(|s| s.is_loading = is_loading);
    }

    /// Reload from page 1, replacing the list
    pub async fn fetch_data(
        &self,
        callbacks: Callbacks<PageResponse<T>>,
    ) -> Option<PageResponse<T>> {
        let (filter, page_size) = self.store.read(|s| (s.filter.clone(), s.page_size));
        self.store.set(|s| {
            s.items.clear();
            s.is_loading = true;
            s.page_index = FIRST_PAGE;
        });

        debug!("🔄 [INFINITE] Reloading from page {}", FIRST_PAGE);
        let request = PageRequest {
            page_index: FIRST_PAGE,
            page_size,
        };
        let response = match (self.fetcher)(filter, request).await {
            Ok(response) => {
                let page_len = response.data.len();
                let items = tag(response.data.clone(), FIRST_PAGE);
                self.store.set(|s| {
                    s.items = uniq_by_identity(items);
                    s.error = None;
                    s.record_page(response.total, page_len);
                });
                self.succeed(&callbacks, response)
            }
            Err(err) => self.fail(&callbacks, err),
        };

        self.store.set(|s| {
            s.is_loading = false;
            s.is_loaded = true;
        });
        response
    }

    /// Append the page after `page_index`, skipping items already in the list
    pub async fn fetch_next_page(
        &self,
        callbacks: Callbacks<PageResponse<T>>,
    ) -> Option<PageResponse<T>> {
        let (filter, page_size, page_index) =
            self.store.read(|s| (s.filter.clone(), s.page_size, s.page_index));
        let next_page = page_index + 1;
        self.store.set(|s| {
            s.is_loading = true;
            s.is_fetching_next_page = true;
        });

        debug!("🔄 [INFINITE] Fetching next page {}", next_page);
        let request = PageRequest {
            page_index: next_page,
            page_size,
        };
        let response = match (self.fetcher)(filter, request).await {
            Ok(response) => {
                let page_len = response.data.len();
                let page = response.page_index.unwrap_or(next_page);
                let fetched = tag(response.data.clone(), page);
                self.store.set(|s| {
                    let new_items = find_difference_items(&fetched, &s.items, same_identity);
                    debug!(
                        "📄 [INFINITE] Page {}: {} fetched, {} new",
                        page,
                        page_len,
                        new_items.len()
                    );
                    s.items.extend(new_items);
                    s.page_index = next_page;
                    s.error = None;
                    s.record_page(response.total, page_len);
                });
                self.succeed(&callbacks, response)
            }
            Err(err) => {
                // A failed page must not be skipped: retrying asks for it again.
                self.store.set(|s| s.page_index = page_index);
                self.fail(&callbacks, err)
            }
        };

        self.store.set(|s| {
            s.is_loading = false;
            s.is_fetching_next_page = false;
        });
        response
    }

    /// Fetch page 1 with the refresh page size and put unseen items in front
    pub async fn refresh_page(
        &self,
        callbacks: Callbacks<PageResponse<T>>,
    ) -> Option<PageResponse<T>> {
        let filter = self.store.read(|s| s.filter.clone());
        self.store.set(|s| s.is_refreshing = true);

        debug!("🔄 [INFINITE] Refreshing head of list");
        let request = PageRequest {
            page_index: FIRST_PAGE,
            page_size: self.options.refresh_page_size,
        };
        let response = match (self.fetcher)(filter, request).await {
            Ok(response) => {
                let fetched = tag(response.data.clone(), FIRST_PAGE);
                self.store.set(|s| {
                    let mut items = find_difference_items(&fetched, &s.items, same_identity);
                    debug!("📄 [INFINITE] Refresh found {} new items", items.len());
                    items.append(&mut s.items);
                    s.items = items;
                    s.total = response.total;
                    s.error = None;
                    s.recompute_has_next_page();
                });
                self.succeed(&callbacks, response)
            }
            Err(err) => self.fail(&callbacks, err),
        };

        self.store.set(|s| s.is_refreshing = false);
        response
    }

    /// Re-fetch page `page` and overwrite its slice of the list in place.
    ///
    /// Page numbers start at 1; 0 is treated as 1.
    pub async fn fetch_exact_page(
        &self,
        page: u32,
        callbacks: Callbacks<PageResponse<T>>,
    ) -> Option<PageResponse<T>> {
        let page = page.max(FIRST_PAGE);
        let (filter, page_size) = self.store.read(|s| (s.filter.clone(), s.page_size));
        self.store.set(|s| s.is_fetching_exact_page = true);

        debug!("🔄 [INFINITE] Fetching exact page {}", page);
        let request = PageRequest {
            page_index: page,
            page_size,
        };
        let response = match (self.fetcher)(filter, request).await {
            Ok(response) => {
                let page_len = response.data.len();
                let fetched = tag(response.data.clone(), page);
                self.store.set(|s| {
                    let len = s.items.len();
                    let start = ((page - 1) as usize).saturating_mul(page_size).min(len);
                    let end = (page as usize).saturating_mul(page_size).min(len);
                    s.items.splice(start..end, fetched);
                    s.items = uniq_by_identity(std::mem::take(&mut s.items));
                    s.error = None;
                    s.record_page(response.total, page_len);
                });
                self.succeed(&callbacks, response)
            }
            Err(err) => self.fail(&callbacks, err),
        };

        self.store.set(|s| s.is_fetching_exact_page = false);
        response
    }

    /// Drop every item whose identity equals `id`. No fetch.
    pub fn remove_item_by_id(&self, id: &T::Id) {
        self.store.set(|s| {
            s.items.retain(|paged| paged.id().as_ref() != Some(id));
            s.recompute_has_next_page();
        });
    }

    fn succeed(
        &self,
        callbacks: &Callbacks<PageResponse<T>>,
        response: PageResponse<T>,
    ) -> Option<PageResponse<T>> {
        handle_success(&[callbacks, &self.callbacks], &response);
        Some(response)
    }

    fn fail(
        &self,
        callbacks: &Callbacks<PageResponse<T>>,
        err: QueryError,
    ) -> Option<PageResponse<T>> {
        debug!("❌ [INFINITE] Page fetch failed: {}", err);
        self.store.set(|s| s.error = Some(err.clone()));
        handle_error(&[callbacks, &self.callbacks], &err, "INFINITE");
        None
    }
}
