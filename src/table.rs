use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::markup::{Link, Markup};
use crate::models::parse_int_prefix;
use crate::notify::Notifier;
use crate::transport::{HttpResponse, Transport};
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Called after a component replaced the table body. Observers re-read the new markup.
pub trait TableObserver: Send + Sync {
    fn table_replaced(&self, body_html: &str);
}

/// Lets two components observe each other without keeping each other alive.
impl<O: TableObserver> TableObserver for Weak<O> {
    fn table_replaced(&self, body_html: &str) {
        if let Some(observer) = self.upgrade() {
            observer.table_replaced(body_html);
        }
    }
}

/// Raw response text keyed by URL. Entries are never replaced or evicted.
#[derive(Debug, Default)]
pub struct FragmentCache {
    entries: HashMap<String, String>,
}

impl FragmentCache {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns `false` when the key was already present; the first entry wins.
    pub fn insert(&mut self, key: String, html: String) -> bool {
        match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(html);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableView {
    pub body_html: String,
    /// `None` when the page has no pager; responses never add one.
    pub pager_html: Option<String>,
    pub pager_links: Vec<Link>,
    pub sort_links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fetched and rendered. Carries the URL that was prefetched, if any.
    Loaded { prefetched: Option<String> },
    FromCache,
    /// Another refresh was in flight.
    Dropped,
    /// The clicked sort link was already active.
    Unchanged,
    /// The fetch failed; the table was left as it was.
    Failed,
}

struct Refresh {
    cache: FragmentCache,
    in_flight: Option<String>,
    view: TableView,
}

enum Claim {
    Busy,
    Cached(String),
    Fetch,
}

impl Refresh {
    /// Serves from the cache, or marks `key` in flight. Never both.
    fn claim(&mut self, key: &str) -> Claim {
        if self.in_flight.is_some() {
            return Claim::Busy;
        }
        if let Some(html) = self.cache.get(key) {
            return Claim::Cached(html.to_string());
        }
        self.in_flight = Some(key.to_string());
        Claim::Fetch
    }
}

pub struct TableRefresher<T, N> {
    config: ClientConfig,
    transport: Arc<T>,
    notifier: Arc<N>,
    state: Mutex<Refresh>,
    observers: Mutex<Vec<Arc<dyn TableObserver>>>,
}

impl<T: Transport, N: Notifier> TableRefresher<T, N> {
    /// Takes over the table of a rendered page. `None` when the page has no `tbody`.
    pub fn mount(config: ClientConfig, transport: Arc<T>, notifier: Arc<N>, page: &Markup) -> Option<Self> {
        let fragments = page.table_fragments();
        let body_html = fragments.body?;
        let view = TableView {
            body_html,
            pager_links: page.pager_links(),
            pager_html: fragments.pager,
            sort_links: page.sort_links(),
        };

        Some(Self {
            config,
            transport,
            notifier,
            state: Mutex::new(Refresh {
                cache: FragmentCache::default(),
                in_flight: None,
                view,
            }),
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn observe(&self, observer: Arc<dyn TableObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn view(&self) -> TableView {
        self.state.lock().view.clone()
    }

    pub fn is_cached(&self, href: &str) -> bool {
        self.config
            .resolve(href)
            .map(|url| self.state.lock().cache.contains(url.as_str()))
            .unwrap_or(false)
    }

    pub fn cached_pages(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub async fn click_page(&self, href: &str) -> Result<RefreshOutcome, ClientError> {
        self.navigate(href).await
    }

    /// Marks the clicked sort link active (clearing the previous one) and refreshes.
    /// Clicking the already active link does nothing; while another refresh is in
    /// flight the click is dropped and the markers stay as they were.
    pub async fn click_sort(&self, href: &str) -> Result<RefreshOutcome, ClientError> {
        let url = self.config.resolve(href)?;
        let claim = {
            let mut state = self.state.lock();
            if state.in_flight.is_some() {
                debug!(%url, "sort dropped, refresh in flight");
                return Ok(RefreshOutcome::Dropped);
            }
            let position = state
                .view
                .sort_links
                .iter()
                .position(|link| self.config.resolve(&link.href).is_ok_and(|target| target == url))
                .ok_or_else(|| ClientError::unknown_target(format!("no sort link for {href}")))?;
            if state.view.sort_links[position].active {
                return Ok(RefreshOutcome::Unchanged);
            }
            let claim = state.claim(url.as_str());
            for (index, link) in state.view.sort_links.iter_mut().enumerate() {
                link.active = index == position;
            }
            claim
        };
        self.complete(url, claim).await
    }

    pub async fn navigate(&self, href: &str) -> Result<RefreshOutcome, ClientError> {
        let url = self.config.resolve(href)?;
        let claim = self.state.lock().claim(url.as_str());
        self.complete(url, claim).await
    }

    async fn complete(&self, url: Url, claim: Claim) -> Result<RefreshOutcome, ClientError> {
        match claim {
            Claim::Busy => {
                debug!(%url, "refresh dropped, another one is in flight");
                return Ok(RefreshOutcome::Dropped);
            }
            Claim::Cached(html) => {
                debug!(%url, "rendering table from cache");
                self.render(&html);
                return Ok(RefreshOutcome::FromCache);
            }
            Claim::Fetch => {}
        }

        let result = self.transport.get(&url).await.and_then(HttpResponse::into_success);
        self.state.lock().in_flight = None;

        let html = match result {
            Ok(html) => html,
            Err(err) => {
                warn!(%url, error = %err, "table refresh failed");
                self.notifier.alert("Failed to load perks");
                return Ok(RefreshOutcome::Failed);
            }
        };

        self.state.lock().cache.insert(url.to_string(), html.clone());
        self.render(&html);
        info!(%url, "table refreshed");

        let prefetched = if self.config.prefetch {
            self.prefetch(&url).await
        } else {
            None
        };
        Ok(RefreshOutcome::Loaded { prefetched })
    }

    /// Loads the page after `current` into the cache. Failures are only logged.
    async fn prefetch(&self, current: &Url) -> Option<String> {
        let Some(next) = next_page_url(current) else {
            debug!(url = %current, "no page after this one to prefetch");
            return None;
        };
        let key = next.to_string();
        if self.state.lock().cache.contains(&key) {
            return None;
        }

        match self.transport.get(&next).await.and_then(HttpResponse::into_success) {
            Ok(html) => {
                self.state.lock().cache.insert(key.clone(), html);
                debug!(url = %next, "next page prefetched");
                Some(key)
            }
            Err(err) => {
                debug!(url = %next, error = %err, "prefetch failed");
                None
            }
        }
    }

    fn render(&self, html: &str) {
        let fragments = Markup::document(html).table_fragments();
        let pager_links = fragments.pager.as_deref().map(|pager| Markup::fragment(pager).links());

        let body = {
            let mut state = self.state.lock();
            let view = &mut state.view;
            if let (Some(pager), Some(links)) = (fragments.pager, pager_links) {
                if view.pager_html.is_some() {
                    view.pager_html = Some(pager);
                    view.pager_links = links;
                }
            }
            match fragments.body {
                Some(body) => {
                    view.body_html = body.clone();
                    Some(body)
                }
                None => {
                    warn!("response carried no table body");
                    None
                }
            }
        };

        if let Some(body) = body {
            let observers = self.observers.lock().clone();
            for observer in observers {
                observer.table_replaced(&body);
            }
        }
    }
}

/// Keeps the refresher's view in step when another component renders the body.
impl<T: Transport, N: Notifier> TableObserver for TableRefresher<T, N> {
    fn table_replaced(&self, body_html: &str) {
        self.state.lock().view.body_html = body_html.to_string();
    }
}

/// `current` with `page` incremented (absent counts as 0); other parameters keep their order.
/// `None` when the page number cannot be incremented.
pub fn next_page_url(current: &Url) -> Option<Url> {
    let page = current
        .query_pairs()
        .find(|(name, _)| name == "page")
        .and_then(|(_, value)| parse_int_prefix(&value))
        .unwrap_or(0);
    let next = page.checked_add(1)?.to_string();

    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = current.query_pairs().into_owned().collect();
    pairs.retain_mut(|(name, value)| {
        if name.as_str() != "page" {
            return true;
        }
        if replaced {
            return false;
        }
        value.clone_from(&next);
        replaced = true;
        true
    });
    if !replaced {
        pairs.push(("page".to_string(), next));
    }

    let mut url = current.clone();
    url.query_pairs_mut().clear().extend_pairs(&pairs);
    Some(url)
}
