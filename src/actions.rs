use crate::errors::ClientError;
use crate::markup::Markup;
use crate::models::{CsrfPair, SaveState, SaveTarget, VoteAction, VoteState};
use crate::notify::Notifier;
use crate::table::TableObserver;
use crate::transport::{HttpResponse, PostRequest, Transport};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a vote pair currently displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteView {
    pub state: VoteState,
    pub rating: i64,
    pub up_voted: bool,
    pub down_voted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveView {
    pub state: SaveState,
    pub saved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome<V> {
    /// The server accepted the change; the view shows the new state.
    Confirmed(V),
    /// The request failed; the view shows the restored pre-click state.
    RolledBack(V),
    /// Not logged in. Nothing was sent.
    Rejected,
    /// A request for the same widget is still pending. Nothing was sent.
    Ignored,
}

struct Slot<S> {
    state: S,
    pending: bool,
    /// Generation of the bind that created this slot.
    binding: u64,
    logged_in: bool,
    csrf: CsrfPair,
}

enum Begin<S> {
    Rejected,
    Ignored,
    Started { prior: S, csrf: CsrfPair },
}

impl<S: Copy> Slot<S> {
    fn new(state: S, binding: u64, logged_in: bool, csrf: CsrfPair) -> Self {
        Self {
            state,
            pending: false,
            binding,
            logged_in,
            csrf,
        }
    }

    fn begin(&mut self, next: impl FnOnce(S) -> S) -> Begin<S> {
        if !self.logged_in {
            return Begin::Rejected;
        }
        if self.pending {
            return Begin::Ignored;
        }
        let prior = self.state;
        self.state = next(prior);
        self.pending = true;
        Begin::Started {
            prior,
            csrf: self.csrf.clone(),
        }
    }

    fn settle(&mut self, prior: S, confirmed: bool) {
        self.pending = false;
        if !confirmed {
            self.state = prior;
        }
    }
}

struct VoteWidget {
    slot: Slot<VoteState>,
    /// Rating without this user's vote; fixed at bind time.
    base_rating: i64,
}

impl VoteWidget {
    fn view_of(&self, state: VoteState) -> VoteView {
        VoteView {
            state,
            rating: self.base_rating + state.value(),
            up_voted: state == VoteState::Up,
            down_voted: state == VoteState::Down,
        }
    }

    fn view(&self) -> VoteView {
        self.view_of(self.slot.state)
    }
}

fn save_keys(markup: &Markup) -> HashSet<(SaveTarget, String)> {
    markup
        .save_containers()
        .into_iter()
        .map(|container| (container.target, container.id))
        .collect()
}

fn save_view(state: SaveState) -> SaveView {
    SaveView {
        state,
        saved: state.is_saved(),
    }
}

#[derive(Default)]
struct Widgets {
    /// Bumped on every bind; completions from an older binding leave newer slots alone.
    generation: u64,
    votes: HashMap<String, VoteWidget>,
    saves: HashMap<(SaveTarget, String), Slot<SaveState>>,
    /// Save slots that live in table rows and go away with them.
    row_saves: HashSet<(SaveTarget, String)>,
}

pub struct ActionController<T, N> {
    transport: Arc<T>,
    notifier: Arc<N>,
    widgets: Mutex<Widgets>,
}

impl<T: Transport, N: Notifier> ActionController<T, N> {
    pub fn new(transport: Arc<T>, notifier: Arc<N>) -> Self {
        Self {
            transport,
            notifier,
            widgets: Mutex::new(Widgets::default()),
        }
    }

    /// Replaces the widget set with the containers found in `markup`.
    pub fn bind(&self, markup: &Markup) {
        let mut widgets = self.widgets.lock();
        widgets.generation += 1;
        widgets.saves.clear();
        Self::bind_into(&mut widgets, markup);
        widgets.row_saves = markup
            .table_fragments()
            .body
            .map(|body| save_keys(&Markup::table_body(&body)))
            .unwrap_or_default();
    }

    /// Rebinds after a table body replacement. Vote controls only live in table
    /// rows, so they are all replaced; save controls outside the table stay bound.
    pub fn rebind_rows(&self, rows: &Markup) {
        let mut widgets = self.widgets.lock();
        widgets.generation += 1;
        for key in std::mem::take(&mut widgets.row_saves) {
            widgets.saves.remove(&key);
        }
        Self::bind_into(&mut widgets, rows);
        widgets.row_saves = save_keys(rows);
    }

    fn bind_into(widgets: &mut Widgets, markup: &Markup) {
        let generation = widgets.generation;

        let mut votes = HashMap::new();
        for container in markup.vote_containers() {
            let base_rating = container.displayed_rating - container.vote_state.value();
            votes.insert(
                container.perk_id,
                VoteWidget {
                    slot: Slot::new(container.vote_state, generation, container.logged_in, container.csrf),
                    base_rating,
                },
            );
        }
        widgets.votes = votes;

        for container in markup.save_containers() {
            widgets.saves.insert(
                (container.target, container.id),
                Slot::new(container.save_state, generation, container.logged_in, container.csrf),
            );
        }

        debug!(
            generation,
            votes = widgets.votes.len(),
            saves = widgets.saves.len(),
            "action widgets bound"
        );
    }

    pub fn vote_view(&self, perk_id: &str) -> Option<VoteView> {
        self.widgets.lock().votes.get(perk_id).map(VoteWidget::view)
    }

    pub fn save_view(&self, target: SaveTarget, id: &str) -> Option<SaveView> {
        self.widgets
            .lock()
            .saves
            .get(&(target, id.to_string()))
            .map(|slot| save_view(slot.state))
    }

    pub fn vote_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.widgets.lock().votes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn vote(&self, perk_id: &str, action: VoteAction) -> Result<ActionOutcome<VoteView>, ClientError> {
        let (binding, begin, before, after) = {
            let mut widgets = self.widgets.lock();
            let widget = widgets
                .votes
                .get_mut(perk_id)
                .ok_or_else(|| ClientError::unknown_target(format!("no vote controls for perk {perk_id}")))?;
            let before = widget.view();
            let begin = widget.slot.begin(|state| state.apply(action));
            (widget.slot.binding, begin, before, widget.view())
        };

        let (prior, csrf) = match begin {
            Begin::Rejected => {
                self.notifier.alert("You must be logged in to vote");
                return Ok(ActionOutcome::Rejected);
            }
            Begin::Ignored => {
                debug!(perk_id, "vote dropped, request pending");
                return Ok(ActionOutcome::Ignored);
            }
            Begin::Started { prior, csrf } => (prior, csrf),
        };

        let request = PostRequest::new(format!("/perks/{perk_id}/{}", action.path_segment())).with_csrf(csrf);
        let confirmed = self.confirm(request).await;
        if !confirmed {
            self.notifier.alert("Voting failed. Reverting...");
        }

        let settled = {
            let mut widgets = self.widgets.lock();
            widgets
                .votes
                .get_mut(perk_id)
                .filter(|widget| widget.slot.binding == binding)
                .map(|widget| {
                    widget.slot.settle(prior, confirmed);
                    widget.view()
                })
        };

        let view = settled.unwrap_or_else(|| {
            debug!(perk_id, "vote settled after rebind");
            if confirmed { after } else { before }
        });

        if confirmed {
            info!(perk_id, rating = view.rating, "vote confirmed");
            Ok(ActionOutcome::Confirmed(view))
        } else {
            Ok(ActionOutcome::RolledBack(view))
        }
    }

    pub async fn save(&self, target: SaveTarget, id: &str) -> Result<ActionOutcome<SaveView>, ClientError> {
        let key = (target, id.to_string());
        let (binding, begin) = {
            let mut widgets = self.widgets.lock();
            let slot = widgets.saves.get_mut(&key).ok_or_else(|| {
                ClientError::unknown_target(format!("no save control for {} {id}", target.label().to_lowercase()))
            })?;
            (slot.binding, slot.begin(SaveState::toggled))
        };

        let (prior, csrf) = match begin {
            Begin::Rejected => {
                self.notifier
                    .alert(&format!("You must be logged in to save {}!", target.noun()));
                return Ok(ActionOutcome::Rejected);
            }
            Begin::Ignored => {
                debug!(id, "save dropped, request pending");
                return Ok(ActionOutcome::Ignored);
            }
            Begin::Started { prior, csrf } => (prior, csrf),
        };

        let request = PostRequest::new(target.endpoint(id)).with_csrf(csrf);
        let confirmed = self.confirm(request).await;
        if !confirmed {
            self.notifier
                .alert(&format!("{} failed to save. Reverting...", target.label()));
        }

        let state = {
            let mut widgets = self.widgets.lock();
            widgets
                .saves
                .get_mut(&key)
                .filter(|slot| slot.binding == binding)
                .map(|slot| {
                    slot.settle(prior, confirmed);
                    slot.state
                })
        }
        .unwrap_or(if confirmed { prior.toggled() } else { prior });

        if confirmed {
            info!(id, saved = state.is_saved(), "save confirmed");
            Ok(ActionOutcome::Confirmed(save_view(state)))
        } else {
            Ok(ActionOutcome::RolledBack(save_view(state)))
        }
    }

    async fn confirm(&self, request: PostRequest) -> bool {
        let path = request.path.clone();
        match self.transport.post(request).await.and_then(HttpResponse::into_success) {
            Ok(_) => true,
            Err(err) => {
                warn!(%path, error = %err, "action not confirmed, rolling back");
                false
            }
        }
    }
}

/// A replaced table body detaches the old row controls; bind the new ones.
impl<T: Transport, N: Notifier> TableObserver for ActionController<T, N> {
    fn table_replaced(&self, body_html: &str) {
        self.rebind_rows(&Markup::table_body(body_html));
    }
}
