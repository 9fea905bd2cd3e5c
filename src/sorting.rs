use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::PerkRecord;
use crate::table::TableObserver;
use crate::ui::render_perk_rows;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info};

/// Stand-in for a missing expiry date; sorts after every real date.
const NO_EXPIRY: i64 = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Benefit,
    MembershipType,
    Organization,
    Product,
    Company,
    Region,
    Rating,
    Expiry,
}

impl FromStr for SortField {
    type Err = ClientError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "benefit" => Ok(Self::Benefit),
            "membership" | "membershipType" => Ok(Self::MembershipType),
            "organization" | "organizationName" => Ok(Self::Organization),
            "product" => Ok(Self::Product),
            "company" => Ok(Self::Company),
            "region" => Ok(Self::Region),
            "rating" => Ok(Self::Rating),
            "expiry" | "expiryDate" => Ok(Self::Expiry),
            other => Err(ClientError::usage(format!("unknown sort field '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `desc` in any case is descending; anything else, including nothing, is ascending.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.eq_ignore_ascii_case("desc") => Self::Desc,
            _ => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Number(i64),
    Text(String),
}

fn text_key(value: Option<&str>) -> SortKey {
    SortKey::Text(value.unwrap_or("").to_lowercase())
}

fn sort_key(perk: &PerkRecord, field: SortField) -> SortKey {
    let membership = perk.membership.as_ref();
    let product = perk.product.as_ref();
    match field {
        SortField::Benefit => text_key(perk.benefit.as_deref()),
        SortField::MembershipType => text_key(membership.and_then(|m| m.kind.as_deref())),
        SortField::Organization => text_key(membership.and_then(|m| m.organization_name.as_deref())),
        SortField::Product => text_key(product.and_then(|p| p.name.as_deref())),
        SortField::Company => text_key(product.and_then(|p| p.company.as_deref())),
        SortField::Region => text_key(perk.region.as_deref()),
        SortField::Rating => SortKey::Number(perk.rating.unwrap_or(0)),
        SortField::Expiry => SortKey::Number(perk.expiry_date.unwrap_or(NO_EXPIRY)),
    }
}

pub fn compare(a: &PerkRecord, b: &PerkRecord, field: SortField, direction: SortDirection) -> Ordering {
    let ordering = sort_key(a, field).cmp(&sort_key(b, field));
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Stable sort over borrowed rows; the snapshot itself is never reordered.
pub fn sort_snapshot(rows: &[PerkRecord], field: SortField, direction: SortDirection) -> Vec<&PerkRecord> {
    let mut sorted: Vec<&PerkRecord> = rows.iter().collect();
    sorted.sort_by(|a, b| compare(a, b, field, direction));
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    Rendered,
    /// Same field and direction as the current rendering.
    Unchanged,
    /// A later request arrived within the debounce window.
    Superseded,
}

struct SortState {
    current: Option<(SortField, SortDirection)>,
    body_html: String,
}

pub struct SortEngine {
    snapshot: Vec<PerkRecord>,
    config: ClientConfig,
    ticket: AtomicU64,
    state: Mutex<SortState>,
    observers: Mutex<Vec<Arc<dyn TableObserver>>>,
}

impl SortEngine {
    pub fn new(snapshot: Vec<PerkRecord>, config: ClientConfig, body_html: String) -> Self {
        Self {
            snapshot,
            config,
            ticket: AtomicU64::new(0),
            state: Mutex::new(SortState {
                current: None,
                body_html,
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn observe(&self, observer: Arc<dyn TableObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn body_html(&self) -> String {
        self.state.lock().body_html.clone()
    }

    pub fn current(&self) -> Option<(SortField, SortDirection)> {
        self.state.lock().current
    }

    /// A sort link click: reads `sort` and `direction` from the link target.
    pub async fn request_link(&self, href: &str) -> Result<SortOutcome, ClientError> {
        let url = self.config.resolve(href)?;
        let mut field = None;
        let mut direction = None;
        for (name, value) in url.query_pairs() {
            match &*name {
                "sort" if field.is_none() => field = Some(value.into_owned()),
                "direction" if direction.is_none() => direction = Some(value.into_owned()),
                _ => {}
            }
        }

        let field: SortField = field
            .ok_or_else(|| ClientError::usage(format!("sort link without a sort field: {href}")))?
            .parse()?;
        Ok(self.request(field, SortDirection::from_param(direction.as_deref())).await)
    }

    /// Debounced sort: only the last request within the window renders.
    pub async fn request(&self, field: SortField, direction: SortDirection) -> SortOutcome {
        let ticket = self.ticket.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        tokio::time::sleep(self.config.sort_debounce).await;
        if self.ticket.load(AtomicOrdering::SeqCst) != ticket {
            debug!(?field, ?direction, "sort superseded");
            return SortOutcome::Superseded;
        }
        self.apply(field, direction)
    }

    /// Sorts and renders immediately, skipping the debounce.
    pub fn apply(&self, field: SortField, direction: SortDirection) -> SortOutcome {
        let body = {
            let mut state = self.state.lock();
            if state.current == Some((field, direction)) {
                return SortOutcome::Unchanged;
            }
            let sorted = sort_snapshot(&self.snapshot, field, direction);
            let body = render_perk_rows(&sorted);
            state.current = Some((field, direction));
            state.body_html.clone_from(&body);
            body
        };

        info!(?field, ?direction, rows = self.snapshot.len(), "table sorted");
        let observers = self.observers.lock().clone();
        for observer in observers {
            observer.table_replaced(&body);
        }
        SortOutcome::Rendered
    }
}

/// Another component replaced the body, so the rendered order is no longer ours.
impl TableObserver for SortEngine {
    fn table_replaced(&self, body_html: &str) {
        let mut state = self.state.lock();
        state.current = None;
        state.body_html = body_html.to_string();
    }
}
