use serde::{Deserialize, Serialize};

/// A user's vote on a perk, mirrored from `data-vote-state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoteState {
    Down,
    #[default]
    Neutral,
    Up,
}

impl VoteState {
    /// Reads a `data-vote-state` value. Unparsable or out-of-range input is neutral.
    pub fn from_attr(raw: &str) -> Self {
        parse_int_prefix(raw).map(Self::from_value).unwrap_or_default()
    }

    pub fn from_value(value: i64) -> Self {
        match value {
            1 => Self::Up,
            -1 => Self::Down,
            _ => Self::Neutral,
        }
    }

    pub fn value(self) -> i64 {
        match self {
            Self::Down => -1,
            Self::Neutral => 0,
            Self::Up => 1,
        }
    }

    /// Toggle semantics: the active choice clears, the other one replaces it.
    pub fn apply(self, action: VoteAction) -> Self {
        match (action, self) {
            (VoteAction::Upvote, Self::Up) => Self::Neutral,
            (VoteAction::Upvote, _) => Self::Up,
            (VoteAction::Downvote, Self::Down) => Self::Neutral,
            (VoteAction::Downvote, _) => Self::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Upvote,
    Downvote,
}

impl VoteAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Unsaved,
    Saved,
}

impl SaveState {
    pub fn from_attr(raw: &str) -> Self {
        match parse_int_prefix(raw) {
            Some(1) => Self::Saved,
            _ => Self::Unsaved,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Saved => Self::Unsaved,
            Self::Unsaved => Self::Saved,
        }
    }

    pub fn is_saved(self) -> bool {
        self == Self::Saved
    }
}

/// What a save toggle is attached to; decides the endpoint and the messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveTarget {
    Perk,
    Membership,
}

impl SaveTarget {
    pub fn endpoint(self, id: &str) -> String {
        match self {
            Self::Perk => format!("/perks/{id}/save"),
            Self::Membership => format!("/memberships/{id}/save"),
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            Self::Perk => "perks",
            Self::Membership => "memberships",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Perk => "Perk",
            Self::Membership => "Membership",
        }
    }
}

/// Anti-forgery header name and token, as rendered into `data-csrf-*`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CsrfPair {
    pub header: String,
    pub token: String,
}

impl CsrfPair {
    pub fn new(header: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            token: token.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipInfo {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub organization_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
}

/// One row of the embedded perk snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkRecord {
    pub id: i64,
    pub benefit: Option<String>,
    pub rating: Option<i64>,
    /// Milliseconds since the Unix epoch.
    pub expiry_date: Option<i64>,
    pub region: Option<String>,
    pub membership: Option<MembershipInfo>,
    pub product: Option<ProductInfo>,
    #[serde(default)]
    pub save_state: i64,
    #[serde(default)]
    pub vote_state: i64,
    #[serde(default)]
    pub csrf_param: String,
    #[serde(default)]
    pub csrf_header: String,
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub is_authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub organization_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipListResponse {
    #[serde(default)]
    pub memberships: Vec<MembershipSummary>,
}

/// Leading-integer parse: optional whitespace, optional sign, digits. Trailing text is ignored.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let magnitude: i64 = rest[..digits].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
