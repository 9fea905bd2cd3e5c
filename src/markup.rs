use crate::errors::ClientError;
use crate::models::{parse_int_prefix, CsrfPair, PerkRecord, SaveState, SaveTarget, VoteState};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Zero-based index of the rating column in a perks table row.
pub const RATING_COLUMN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteContainer {
    pub perk_id: String,
    pub vote_state: VoteState,
    pub logged_in: bool,
    pub csrf: CsrfPair,
    pub displayed_rating: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveContainer {
    pub target: SaveTarget,
    pub id: String,
    pub save_state: SaveState,
    pub logged_in: bool,
    pub csrf: CsrfPair,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub active: bool,
}

/// Inner markup of the parts of a response that replace the live table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFragments {
    pub body: Option<String>,
    pub pager: Option<String>,
}

pub struct Markup {
    html: Html,
}

impl Markup {
    pub fn document(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Parses the inner markup of a `tbody`. Rows only survive HTML parsing inside a table.
    pub fn table_body(inner: &str) -> Self {
        Self::document(&format!("<table><tbody>{inner}</tbody></table>"))
    }

    pub fn fragment(html: &str) -> Self {
        Self {
            html: Html::parse_fragment(html),
        }
    }

    pub fn vote_containers(&self) -> Vec<VoteContainer> {
        let containers = selector(".vote-forms");
        let rows = selector("tr");

        let mut found = Vec::new();
        for row in self.html.select(&rows) {
            for container in row.select(&containers) {
                let Some(perk_id) = container.value().attr("data-perk-id") else {
                    warn!("vote container without data-perk-id");
                    continue;
                };
                let displayed_rating = rating_cell(row).unwrap_or_else(|| {
                    warn!(perk_id, "rating cell missing or not a number");
                    0
                });
                found.push(VoteContainer {
                    perk_id: perk_id.to_string(),
                    vote_state: VoteState::from_attr(attr(container, "data-vote-state")),
                    logged_in: logged_in(container),
                    csrf: csrf_pair(container),
                    displayed_rating,
                });
            }
        }
        found
    }

    pub fn save_containers(&self) -> Vec<SaveContainer> {
        let mut found = Vec::new();
        for (css, target, id_attr) in [
            (".perk-save-forms", SaveTarget::Perk, "data-perk-id"),
            (".membership-save-forms", SaveTarget::Membership, "data-membership-id"),
        ] {
            for container in self.html.select(&selector(css)) {
                let Some(id) = container.value().attr(id_attr) else {
                    warn!(container = css, "save container without {id_attr}");
                    continue;
                };
                found.push(SaveContainer {
                    target,
                    id: id.to_string(),
                    save_state: SaveState::from_attr(attr(container, "data-save-state")),
                    logged_in: logged_in(container),
                    csrf: csrf_pair(container),
                });
            }
        }
        found
    }

    /// First `tbody` and first `.pager` of a response document.
    pub fn table_fragments(&self) -> TableFragments {
        TableFragments {
            body: self.first_inner_html("tbody"),
            pager: self.first_inner_html(".pager"),
        }
    }

    pub fn first_inner_html(&self, css: &str) -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        self.html.select(&selector).next().map(|element| element.inner_html())
    }

    /// Every anchor in the parsed markup; used on pager fragments.
    pub fn links(&self) -> Vec<Link> {
        self.links_matching("a")
    }

    pub fn pager_links(&self) -> Vec<Link> {
        self.links_matching(".pager a")
    }

    pub fn sort_links(&self) -> Vec<Link> {
        self.links_matching("th.sortable a")
    }

    fn links_matching(&self, css: &'static str) -> Vec<Link> {
        self.html
            .select(&selector(css))
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                Some(Link {
                    href: href.to_string(),
                    active: anchor.value().classes().any(|class| class == "active"),
                })
            })
            .collect()
    }

    /// The `<script id="all-perks" type="application/json">` snapshot, when the page carries one.
    pub fn perk_snapshot(&self) -> Result<Option<Vec<PerkRecord>>, ClientError> {
        let Some(script) = self.html.select(&selector("script#all-perks")).next() else {
            return Ok(None);
        };
        let raw: String = script.text().collect();
        let perks = serde_json::from_str(raw.trim())?;
        Ok(Some(perks))
    }

    /// Page-level anti-forgery pair from `meta[name=_csrf]` and `meta[name=_csrf_header]`.
    pub fn meta_csrf(&self) -> Option<CsrfPair> {
        let token = self.meta_content("_csrf")?;
        let header = self.meta_content("_csrf_header")?;
        Some(CsrfPair::new(header, token))
    }

    fn meta_content(&self, name: &str) -> Option<String> {
        let selector = Selector::parse(&format!("meta[name=\"{name}\"]")).ok()?;
        self.html
            .select(&selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string)
    }
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn attr<'a>(element: ElementRef<'a>, name: &str) -> &'a str {
    element.value().attr(name).unwrap_or("")
}

fn logged_in(container: ElementRef<'_>) -> bool {
    attr(container, "data-logged-in") == "true"
}

fn csrf_pair(container: ElementRef<'_>) -> CsrfPair {
    CsrfPair::new(attr(container, "data-csrf-header"), attr(container, "data-csrf-token"))
}

fn rating_cell(row: ElementRef<'_>) -> Option<i64> {
    let cell = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "td")
        .nth(RATING_COLUMN)?;
    let text: String = cell.text().collect();
    parse_int_prefix(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u32, rating: &str, vote: i32) -> String {
        let mut cells = String::new();
        for column in 0..RATING_COLUMN {
            cells.push_str(&format!("<td>c{column}</td>"));
        }
        format!(
            r#"<tr>{cells}<td>{rating}</td><td>
                <div class="vote-forms" data-perk-id="{id}" data-vote-state="{vote}" data-logged-in="true"
                     data-csrf-header="X-CSRF-TOKEN" data-csrf-token="tok">
                  <form action="/perks/{id}/upvote" method="post"><button class="upvote">up</button></form>
                  <form action="/perks/{id}/downvote" method="post"><button class="downvote">down</button></form>
                </div>
                <div class="perk-save-forms" data-perk-id="{id}" data-save-state="1" data-logged-in="false"></div>
            </td></tr>"#
        )
    }

    #[test]
    fn reads_vote_containers_with_their_rating_cell() {
        let body = format!("{}{}", row(3, "5", 1), row(4, "-2", 0));
        let containers = Markup::table_body(&body).vote_containers();

        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].perk_id, "3");
        assert_eq!(containers[0].displayed_rating, 5);
        assert_eq!(containers[0].vote_state, VoteState::Up);
        assert!(containers[0].logged_in);
        assert_eq!(containers[0].csrf, CsrfPair::new("X-CSRF-TOKEN", "tok"));
        assert_eq!(containers[1].displayed_rating, -2);
    }

    #[test]
    fn reads_save_containers_for_both_targets() {
        let html = format!(
            r#"<html><body><table><tbody>{}</tbody></table>
            <div class="membership-save-forms" data-membership-id="9" data-save-state="0" data-logged-in="true"></div>
            </body></html>"#,
            row(3, "0", 0)
        );
        let containers = Markup::document(&html).save_containers();

        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].target, SaveTarget::Perk);
        assert_eq!(containers[0].save_state, SaveState::Saved);
        assert!(!containers[0].logged_in);
        assert_eq!(containers[1].target, SaveTarget::Membership);
        assert_eq!(containers[1].id, "9");
    }

    #[test]
    fn extracts_table_fragments_from_a_document() {
        let html = r#"<html><body>
            <table><thead><tr><th class="sortable"><a class="active" href="/perks?sort=rating">Rating</a></th></tr></thead>
            <tbody><tr><td>row</td></tr></tbody></table>
            <div class="pager"><a href="/perks?page=1">2</a></div>
        </body></html>"#;
        let markup = Markup::document(html);
        let fragments = markup.table_fragments();

        assert_eq!(fragments.body.as_deref(), Some("<tr><td>row</td></tr>"));
        assert_eq!(fragments.pager.as_deref(), Some(r#"<a href="/perks?page=1">2</a>"#));
        assert_eq!(
            markup.sort_links(),
            vec![Link {
                href: "/perks?sort=rating".to_string(),
                active: true
            }]
        );
        assert_eq!(markup.pager_links().len(), 1);
    }

    #[test]
    fn missing_fragments_are_none() {
        let fragments = Markup::document("<html><body><p>nothing</p></body></html>").table_fragments();
        assert_eq!(fragments, TableFragments::default());
    }

    #[test]
    fn reads_snapshot_and_meta_csrf() {
        let html = r#"<html><head>
            <meta name="_csrf" content="abc"><meta name="_csrf_header" content="X-CSRF-TOKEN">
            </head><body>
            <script id="all-perks" type="application/json">[{"id": 1, "benefit": "Free"}]</script>
            </body></html>"#;
        let markup = Markup::document(html);

        let snapshot = markup.perk_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].benefit.as_deref(), Some("Free"));
        assert_eq!(markup.meta_csrf(), Some(CsrfPair::new("X-CSRF-TOKEN", "abc")));
    }

    #[test]
    fn page_without_snapshot_has_none() {
        let markup = Markup::document("<html><body></body></html>");
        assert!(markup.perk_snapshot().unwrap().is_none());
        assert!(markup.meta_csrf().is_none());
    }
}
