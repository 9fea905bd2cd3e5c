use crate::actions::ActionController;
use crate::errors::ClientError;
use crate::memberships::MembershipList;
use crate::sorting::{SortEngine, SortOutcome};
use crate::table::{RefreshOutcome, TableRefresher};
use std::sync::Arc;

/// Everything mounted on one rendered page. Dropped with the page.
pub struct PageState<T, N> {
    pub actions: Arc<ActionController<T, N>>,
    pub table: Option<Arc<TableRefresher<T, N>>>,
    pub sorter: Option<Arc<SortEngine>>,
    pub memberships: Option<Arc<MembershipList<T>>>,
}

impl<T, N> Clone for PageState<T, N> {
    fn clone(&self) -> Self {
        Self {
            actions: Arc::clone(&self.actions),
            table: self.table.clone(),
            sorter: self.sorter.clone(),
            memberships: self.memberships.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Sorted(SortOutcome),
    Refreshed(RefreshOutcome),
}

impl<T: crate::transport::Transport, N: crate::notify::Notifier> PageState<T, N> {
    /// Sort links sort the embedded snapshot when the page has one, and refresh from the server otherwise.
    pub async fn click_sort(&self, href: &str) -> Result<LinkOutcome, ClientError> {
        if let Some(sorter) = &self.sorter {
            return Ok(LinkOutcome::Sorted(sorter.request_link(href).await?));
        }
        let table = self.require_table()?;
        Ok(LinkOutcome::Refreshed(table.click_sort(href).await?))
    }

    pub async fn click_page(&self, href: &str) -> Result<RefreshOutcome, ClientError> {
        self.require_table()?.click_page(href).await
    }

    /// The table body as currently rendered. The table and the sorter keep each other in step.
    pub fn body_html(&self) -> Option<String> {
        match (&self.table, &self.sorter) {
            (Some(table), _) => Some(table.view().body_html),
            (None, Some(sorter)) => Some(sorter.body_html()),
            (None, None) => None,
        }
    }

    fn require_table(&self) -> Result<&Arc<TableRefresher<T, N>>, ClientError> {
        self.table
            .as_ref()
            .ok_or_else(|| ClientError::unknown_target("page has no perks table"))
    }
}
