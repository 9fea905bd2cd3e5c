use crate::actions::ActionController;
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::markup::Markup;
use crate::memberships::MembershipList;
use crate::notify::Notifier;
use crate::sorting::SortEngine;
use crate::state::PageState;
use crate::table::{TableObserver, TableRefresher};
use crate::transport::Transport;
use std::sync::Arc;
use tracing::info;

/// Mounts every component the page has markup for. Vote and save widgets are
/// bound first; the table and the sorter re-bind them after each replacement.
pub fn mount<T, N>(
    html: &str,
    config: &ClientConfig,
    transport: Arc<T>,
    notifier: Arc<N>,
) -> Result<PageState<T, N>, ClientError>
where
    T: Transport + 'static,
    N: Notifier + 'static,
{
    let page = Markup::document(html);

    let actions = Arc::new(ActionController::new(Arc::clone(&transport), Arc::clone(&notifier)));
    actions.bind(&page);
    let observer: Arc<dyn TableObserver> = actions.clone();

    let table = TableRefresher::mount(config.clone(), Arc::clone(&transport), notifier, &page).map(Arc::new);
    if let Some(table) = &table {
        table.observe(Arc::clone(&observer));
    }

    let sorter = match page.perk_snapshot()? {
        Some(snapshot) => {
            let body_html = page.table_fragments().body.unwrap_or_default();
            let sorter = Arc::new(SortEngine::new(snapshot, config.clone(), body_html));
            sorter.observe(observer);
            if let Some(table) = &table {
                table.observe(sorter.clone());
                sorter.observe(Arc::new(Arc::downgrade(table)));
            }
            Some(sorter)
        }
        None => None,
    };

    let memberships = MembershipList::mount(config, transport, &page).map(Arc::new);

    info!(
        votes = actions.vote_ids().len(),
        table = table.is_some(),
        sorter = sorter.is_some(),
        memberships = memberships.is_some(),
        "page mounted"
    );

    Ok(PageState {
        actions,
        table,
        sorter,
        memberships,
    })
}
