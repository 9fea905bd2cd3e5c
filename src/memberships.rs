use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::markup::Markup;
use crate::models::{CsrfPair, MembershipListResponse, MembershipSummary};
use crate::transport::{HttpResponse, PostRequest, Transport};
use crate::ui::render_membership_list;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

pub const LIST_SELECTOR: &str = "#linked-memberships";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    Add,
    Remove,
}

impl MembershipOp {
    fn path(self) -> &'static str {
        match self {
            Self::Add => "/profile/memberships/add",
            Self::Remove => "/profile/memberships/remove",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Add => "Failed to add membership",
            Self::Remove => "Failed to remove membership",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// The list now shows the server's memberships.
    Updated(Vec<MembershipSummary>),
    /// The request or its response failed; the status line says which change.
    Failed,
}

struct StatusLine {
    text: String,
    shown_at: Instant,
}

struct ListState {
    html: String,
    status: Option<StatusLine>,
}

pub struct MembershipList<T> {
    transport: Arc<T>,
    csrf: Option<CsrfPair>,
    flash_duration: Duration,
    state: Mutex<ListState>,
}

impl<T: Transport> MembershipList<T> {
    /// Takes over `#linked-memberships` on a profile page. `None` when the page has no list.
    pub fn mount(config: &ClientConfig, transport: Arc<T>, page: &Markup) -> Option<Self> {
        let html = page.first_inner_html(LIST_SELECTOR)?;
        Some(Self {
            transport,
            csrf: page.meta_csrf(),
            flash_duration: config.flash_duration,
            state: Mutex::new(ListState { html, status: None }),
        })
    }

    pub fn list_html(&self) -> String {
        self.state.lock().html.clone()
    }

    /// The transient status message, while it is still showing.
    pub fn status(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .status
            .as_ref()
            .filter(|status| status.shown_at.elapsed() < self.flash_duration)
            .map(|status| status.text.clone())
    }

    pub async fn add(&self, membership_id: &str) -> MembershipOutcome {
        self.submit(MembershipOp::Add, membership_id).await
    }

    pub async fn remove(&self, membership_id: &str) -> MembershipOutcome {
        self.submit(MembershipOp::Remove, membership_id).await
    }

    /// Sends the change and re-renders the list from the response. On failure
    /// the status line says so and the list keeps its current markup.
    pub async fn submit(&self, op: MembershipOp, membership_id: &str) -> MembershipOutcome {
        let mut request = PostRequest::new(op.path()).with_field("membershipId", membership_id);
        if let Some(csrf) = &self.csrf {
            request = request.with_csrf(csrf.clone());
        }

        let result = self
            .transport
            .post(request)
            .await
            .and_then(HttpResponse::into_success)
            .and_then(|body| serde_json::from_str::<MembershipListResponse>(&body).map_err(ClientError::from));

        match result {
            Ok(payload) => {
                let html = render_membership_list(&payload.memberships);
                // an empty list shows its placeholder without a status message
                let status = (!payload.memberships.is_empty()).then_some("Updated successfully");
                self.set(Some(html), status);
                info!(?op, membership_id, count = payload.memberships.len(), "membership list updated");
                MembershipOutcome::Updated(payload.memberships)
            }
            Err(err) => {
                warn!(?op, membership_id, error = %err, "membership update failed");
                self.set(None, Some(op.failure_message()));
                MembershipOutcome::Failed
            }
        }
    }

    fn set(&self, html: Option<String>, status: Option<&str>) {
        let mut state = self.state.lock();
        if let Some(html) = html {
            state.html = html;
        }
        if let Some(status) = status {
            state.status = Some(StatusLine {
                text: status.to_string(),
                shown_at: Instant::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockTransport, Recorded};
    use crate::ui::NO_MEMBERSHIPS;
    use reqwest::Url;

    const PROFILE: &str = r#"<html><head>
        <meta name="_csrf" content="abc"><meta name="_csrf_header" content="X-CSRF-TOKEN">
        </head><body>
        <ul id="linked-memberships"><li class="list-group-item">Old</li></ul>
        <div id="msg"></div>
        </body></html>"#;

    fn list(transport: MockTransport) -> (MembershipList<MockTransport>, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let config = ClientConfig::new(Url::parse("http://localhost:8080/profile").unwrap());
        let list = MembershipList::mount(&config, Arc::clone(&transport), &Markup::document(PROFILE)).unwrap();
        (list, transport)
    }

    #[tokio::test]
    async fn add_renders_the_servers_list() {
        let transport = MockTransport::new();
        transport.respond(
            "/profile/memberships/add",
            200,
            r#"{"memberships": [{"id": 4, "type": "Gold", "organizationName": "CAA"}]}"#,
        );
        let (list, transport) = list(transport);

        let MembershipOutcome::Updated(memberships) = list.add("4").await else {
            panic!("expected the list to update");
        };

        assert_eq!(memberships.len(), 1);
        assert!(list.list_html().contains(r#"data-id="4""#));
        assert!(!list.list_html().contains("Old"));
        assert_eq!(list.status().as_deref(), Some("Updated successfully"));

        let requests = transport.requests();
        let Recorded::Post(post) = &requests[0] else {
            panic!("expected a post");
        };
        assert_eq!(post.form, vec![("membershipId".to_string(), "4".to_string())]);
        assert_eq!(post.csrf, Some(CsrfPair::new("X-CSRF-TOKEN", "abc")));
    }

    #[tokio::test]
    async fn empty_response_renders_placeholder() {
        let transport = MockTransport::new();
        transport.respond("/profile/memberships/remove", 200, r#"{"memberships": []}"#);
        let (list, _) = list(transport);

        assert_eq!(list.remove("4").await, MembershipOutcome::Updated(Vec::new()));

        assert_eq!(
            list.list_html(),
            format!(r#"<li class="list-group-item">{NO_MEMBERSHIPS}</li>"#)
        );
        assert_eq!(list.status(), None);
    }

    #[tokio::test]
    async fn failure_leaves_list_unchanged() {
        let transport = MockTransport::new();
        transport.respond("/profile/memberships/add", 500, "");
        let (list, _) = list(transport);
        let before = list.list_html();

        assert_eq!(list.add("4").await, MembershipOutcome::Failed);

        assert_eq!(list.list_html(), before);
        assert_eq!(list.status().as_deref(), Some("Failed to add membership"));
    }

    #[tokio::test]
    async fn undecodable_body_counts_as_failure() {
        let transport = MockTransport::new();
        transport.respond("/profile/memberships/remove", 200, "<html>login</html>");
        let (list, _) = list(transport);
        let before = list.list_html();

        assert_eq!(list.remove("4").await, MembershipOutcome::Failed);
        assert_eq!(list.list_html(), before);
        assert_eq!(list.status().as_deref(), Some("Failed to remove membership"));
    }

    #[tokio::test(start_paused = true)]
    async fn status_message_expires() {
        let transport = MockTransport::new();
        transport.respond(
            "/profile/memberships/add",
            200,
            r#"{"memberships": [{"id": 1, "type": "Gold", "organizationName": "CAA"}]}"#,
        );
        let (list, _) = list(transport);

        list.add("1").await;
        assert!(list.status().is_some());

        tokio::time::advance(Duration::from_millis(2001)).await;
        assert!(list.status().is_none());
    }

    #[test]
    fn page_without_list_does_not_mount() {
        let config = ClientConfig::new(Url::parse("http://localhost:8080/").unwrap());
        let page = Markup::document("<html><body></body></html>");
        assert!(MembershipList::mount(&config, Arc::new(MockTransport::new()), &page).is_none());
    }
}
