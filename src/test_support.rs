use crate::errors::ClientError;
use crate::models::{PerkRecord, SaveTarget};
use crate::notify::Notifier;
use crate::transport::{HttpResponse, PostRequest, Transport};
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Post(PostRequest),
    Get(String),
}

#[derive(Clone)]
enum Scripted {
    Respond(HttpResponse),
    Disconnect,
}

/// Scripted transport. POSTs are keyed by path, GETs by the full URL string.
/// Unscripted POSTs succeed with an empty body, unscripted GETs are 404.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<Recorded>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request waits for a permit released through [`MockTransport::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn respond(&self, key: &str, status: u16, body: &str) {
        self.scripts.lock().insert(
            key.to_string(),
            Scripted::Respond(HttpResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    pub fn disconnect(&self, key: &str) {
        self.scripts.lock().insert(key.to_string(), Scripted::Disconnect);
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn posts(&self) -> Vec<PostRequest> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                Recorded::Post(post) => Some(post),
                Recorded::Get(_) => None,
            })
            .collect()
    }

    pub fn gets(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                Recorded::Get(url) => Some(url),
                Recorded::Post(_) => None,
            })
            .collect()
    }

    /// Yields until at least `count` requests have been issued.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.requests.lock().len() < count {
            tokio::task::yield_now().await;
        }
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn scripted(&self, key: &str) -> Option<Scripted> {
        self.scripts.lock().get(key).cloned()
    }
}

impl Transport for MockTransport {
    async fn post(&self, request: PostRequest) -> Result<HttpResponse, ClientError> {
        let key = request.path.clone();
        self.requests.lock().push(Recorded::Post(request));
        self.pass_gate().await;
        match self.scripted(&key) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Disconnect) => Err(ClientError::transport("connection reset")),
            None => Ok(HttpResponse {
                status: 200,
                body: String::new(),
            }),
        }
    }

    async fn get(&self, url: &Url) -> Result<HttpResponse, ClientError> {
        let key = url.to_string();
        self.requests.lock().push(Recorded::Get(key.clone()));
        self.pass_gate().await;
        match self.scripted(&key) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Disconnect) => Err(ClientError::transport("connection reset")),
            None => Ok(HttpResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts.lock().push(message.to_string());
    }
}

/// A perks table row as the server renders it.
pub fn perk_row(id: i64, rating: i64, vote_state: i64, logged_in: bool) -> String {
    crate::ui::render_perk_row(&perk(id, rating, vote_state, logged_in))
}

pub fn perk(id: i64, rating: i64, vote_state: i64, logged_in: bool) -> PerkRecord {
    PerkRecord {
        id,
        benefit: Some(format!("Benefit {id}")),
        rating: Some(rating),
        vote_state,
        csrf_header: "X-CSRF-TOKEN".to_string(),
        csrf_token: "test-token".to_string(),
        is_authenticated: logged_in,
        ..PerkRecord::default()
    }
}

/// A full perks page: sortable header, the given body rows and an optional pager.
pub fn perks_page(body: &str, pager: Option<&str>) -> String {
    let pager = pager
        .map(|links| format!(r#"<div class="pager">{links}</div>"#))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html><head><title>Perks</title></head><body>
<table>
  <thead><tr>
    <th class="sortable"><a href="/perks?sort=rating&amp;direction=asc">Rating</a></th>
    <th class="sortable"><a href="/perks?sort=expiry&amp;direction=asc">Expiry</a></th>
  </tr></thead>
  <tbody>{body}</tbody>
</table>
{pager}
</body></html>"#
    )
}

pub fn save_forms(target: SaveTarget, id: i64, saved: bool, logged_in: bool) -> String {
    let (class, id_attr) = match target {
        SaveTarget::Perk => ("perk-save-forms", "data-perk-id"),
        SaveTarget::Membership => ("membership-save-forms", "data-membership-id"),
    };
    format!(
        r#"<div class="{class}" {id_attr}="{id}" data-save-state="{}" data-logged-in="{logged_in}" data-csrf-header="X-CSRF-TOKEN" data-csrf-token="test-token"><form action="/x/{id}/save" method="post"><button class="save">Save</button></form></div>"#,
        if saved { 1 } else { 0 }
    )
}
