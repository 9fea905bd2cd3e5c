use crate::models::{MembershipSummary, PerkRecord, VoteState};
use chrono::DateTime;

pub const NO_MEMBERSHIPS: &str = "No memberships linked.";

/// Renders the full table body for the given rows, in order.
pub fn render_perk_rows(perks: &[&PerkRecord]) -> String {
    perks.iter().copied().map(render_perk_row).collect()
}

pub fn render_perk_row(perk: &PerkRecord) -> String {
    let membership = perk.membership.clone().unwrap_or_default();
    let product = perk.product.clone().unwrap_or_default();
    let has_membership = perk.membership.is_some();
    let has_product = perk.product.is_some();

    fill(
        ROW_HTML,
        &[
            ("BENEFIT", escape(perk.benefit.as_deref().unwrap_or(""))),
            ("MEMBERSHIP_TYPE", or_none(has_membership, membership.kind.as_deref())),
            (
                "MEMBERSHIP_DESCRIPTION",
                or_none(has_membership, membership.description.as_deref()),
            ),
            (
                "ORGANIZATION",
                or_none(has_membership, membership.organization_name.as_deref()),
            ),
            ("PRODUCT", or_none(has_product, product.name.as_deref())),
            ("COMPANY", or_none(has_product, product.company.as_deref())),
            ("PRODUCT_DESCRIPTION", escape(product.description.as_deref().unwrap_or(""))),
            ("REGION", escape(non_empty(perk.region.as_deref()).unwrap_or("Global"))),
            ("EXPIRY", expiry_label(perk.expiry_date)),
            ("RATING", perk.rating.unwrap_or(0).to_string()),
            ("VOTE_FORMS", render_vote_forms(perk)),
        ],
    )
}

/// The vote sub-forms of one row, carrying everything the action controller binds to.
pub fn render_vote_forms(perk: &PerkRecord) -> String {
    let state = VoteState::from_value(perk.vote_state);
    let csrf_param = if perk.csrf_param.is_empty() { "_csrf" } else { perk.csrf_param.as_str() };
    let voted = |active: bool| (if active { " voted" } else { "" }).to_string();

    fill(
        VOTE_FORMS_HTML,
        &[
            ("ID", perk.id.to_string()),
            ("STATE", state.value().to_string()),
            ("LOGGED_IN", perk.is_authenticated.to_string()),
            ("CSRF_HEADER", escape(&perk.csrf_header)),
            ("CSRF_PARAM", escape(csrf_param)),
            ("CSRF_TOKEN", escape(&perk.csrf_token)),
            ("PAGE", perk.page.to_string()),
            ("UP_CLASS", voted(state == VoteState::Up)),
            ("DOWN_CLASS", voted(state == VoteState::Down)),
        ],
    )
}

/// Renders the profile membership list; an empty list gets a single placeholder item.
pub fn render_membership_list(memberships: &[MembershipSummary]) -> String {
    if memberships.is_empty() {
        return format!(r#"<li class="list-group-item">{NO_MEMBERSHIPS}</li>"#);
    }

    memberships
        .iter()
        .map(|membership| {
            fill(
                MEMBERSHIP_ITEM_HTML,
                &[
                    ("ID", membership.id.to_string()),
                    ("TYPE", escape(membership.kind.as_deref().unwrap_or(""))),
                    (
                        "ORGANIZATION",
                        escape(membership.organization_name.as_deref().unwrap_or("")),
                    ),
                ],
            )
        })
        .collect()
}

/// Substitutes every `{{NAME}}` in `template` in a single pass. Inserted values
/// are never scanned again, so text that looks like a placeholder stays literal.
fn fill(template: &str, fields: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let name = &after[..end];
            fields
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, value)| (end, value))
        });
        match value {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn expiry_label(expiry_ms: Option<i64>) -> String {
    expiry_ms
        .and_then(DateTime::from_timestamp_millis)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "No Expiry".to_string())
}

fn or_none(present: bool, value: Option<&str>) -> String {
    match (present, non_empty(value)) {
        (true, Some(value)) => escape(value),
        _ => "None".to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

const ROW_HTML: &str = r#"<tr>
  <td>{{BENEFIT}}</td>
  <td>{{MEMBERSHIP_TYPE}}</td>
  <td>{{MEMBERSHIP_DESCRIPTION}}</td>
  <td>{{ORGANIZATION}}</td>
  <td>{{PRODUCT}}</td>
  <td>{{COMPANY}}</td>
  <td>{{PRODUCT_DESCRIPTION}}</td>
  <td>{{REGION}}</td>
  <td>{{EXPIRY}}</td>
  <td>{{RATING}}</td>
  <td>{{VOTE_FORMS}}</td>
</tr>
"#;

const VOTE_FORMS_HTML: &str = r#"<div class="vote-forms" data-perk-id="{{ID}}" data-vote-state="{{STATE}}" data-logged-in="{{LOGGED_IN}}" data-csrf-header="{{CSRF_HEADER}}" data-csrf-token="{{CSRF_TOKEN}}" data-page="{{PAGE}}">
    <form action="/perks/{{ID}}/upvote" method="post">
      <input type="hidden" name="{{CSRF_PARAM}}" value="{{CSRF_TOKEN}}" />
      <input type="hidden" name="page" value="{{PAGE}}" />
      <button class="btn-small upvote{{UP_CLASS}}">&#9650;</button>
    </form>
    <form action="/perks/{{ID}}/downvote" method="post">
      <input type="hidden" name="{{CSRF_PARAM}}" value="{{CSRF_TOKEN}}" />
      <input type="hidden" name="page" value="{{PAGE}}" />
      <button class="btn-small downvote{{DOWN_CLASS}}">&#9660;</button>
    </form>
  </div>"#;

const MEMBERSHIP_ITEM_HTML: &str = r#"<li class="list-group-item"><div class="d-flex justify-content-between align-items-center">
  <span><span class="fw-semibold">{{TYPE}}</span> <span class="text-muted"> - {{ORGANIZATION}}</span></span>
  <button class="btn btn-sm btn-outline-danger" data-id="{{ID}}">Remove</button>
</div></li>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Markup;
    use crate::models::{CsrfPair, MembershipInfo};

    fn perk() -> PerkRecord {
        PerkRecord {
            id: 7,
            benefit: Some("Free <coffee>".to_string()),
            rating: Some(4),
            expiry_date: Some(1_767_225_600_000),
            membership: Some(MembershipInfo {
                kind: Some("Gold".to_string()),
                description: None,
                organization_name: Some("CAA".to_string()),
            }),
            vote_state: -1,
            csrf_header: "X-CSRF-TOKEN".to_string(),
            csrf_token: "tok".to_string(),
            page: 2,
            is_authenticated: true,
            ..PerkRecord::default()
        }
    }

    #[test]
    fn rendered_row_round_trips_through_the_vote_contract() {
        let record = perk();
        let html = render_perk_rows(&[&record]);
        let containers = Markup::table_body(&html).vote_containers();

        assert_eq!(containers.len(), 1);
        let container = &containers[0];
        assert_eq!(container.perk_id, "7");
        assert_eq!(container.displayed_rating, 4);
        assert_eq!(container.vote_state, VoteState::Down);
        assert!(container.logged_in);
        assert_eq!(container.csrf, CsrfPair::new("X-CSRF-TOKEN", "tok"));
    }

    #[test]
    fn row_fills_defaults_and_escapes_text() {
        let html = render_perk_row(&perk());
        assert!(html.contains("<td>Free &lt;coffee&gt;</td>"));
        assert!(html.contains("<td>None</td>"));
        assert!(html.contains("<td>Global</td>"));
        assert!(html.contains("<td>2026-01-01</td>"));
        assert!(html.contains(r#"class="btn-small downvote voted""#));
        assert!(html.contains(r#"name="page" value="2""#));
    }

    #[test]
    fn missing_expiry_renders_label() {
        let record = PerkRecord {
            expiry_date: None,
            ..perk()
        };
        assert!(render_perk_row(&record).contains("<td>No Expiry</td>"));
    }

    #[test]
    fn empty_membership_list_renders_placeholder() {
        let html = render_membership_list(&[]);
        assert_eq!(html, r#"<li class="list-group-item">No memberships linked.</li>"#);
    }

    #[test]
    fn membership_items_carry_their_id() {
        let html = render_membership_list(&[MembershipSummary {
            id: 5,
            kind: Some("Student".to_string()),
            organization_name: Some("SPC".to_string()),
        }]);
        assert!(html.contains(r#"data-id="5""#));
        assert!(html.contains("Student"));
        assert!(html.contains(" - SPC"));
    }

    #[test]
    fn placeholder_shaped_text_stays_literal() {
        let record = PerkRecord {
            benefit: Some("{{RATING}} stars".to_string()),
            rating: Some(5),
            ..perk()
        };
        let html = render_perk_row(&record);
        assert!(html.contains("<td>{{RATING}} stars</td>"));
        assert!(html.contains("<td>5</td>"));

        let record = PerkRecord {
            benefit: Some("{{VOTE_FORMS}}".to_string()),
            ..perk()
        };
        let html = render_perk_row(&record);
        assert_eq!(Markup::table_body(&html).vote_containers().len(), 1);
        assert!(html.contains("<td>{{VOTE_FORMS}}</td>"));
    }

    #[test]
    fn membership_text_is_not_substituted_twice() {
        let html = render_membership_list(&[MembershipSummary {
            id: 5,
            kind: Some("{{ORGANIZATION}}".to_string()),
            organization_name: Some("SPC".to_string()),
        }]);
        assert!(html.contains(r#"<span class="fw-semibold">{{ORGANIZATION}}</span>"#));
    }

    #[test]
    fn fill_leaves_unknown_and_unclosed_markers() {
        let filled = fill("{{A}} {{B}} {{A", &[("A", "x".to_string())]);
        assert_eq!(filled, "x {{B}} {{A");
    }
}
