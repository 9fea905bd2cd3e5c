use crate::app::mount;
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::{SaveTarget, VoteAction};
use crate::notify::ConsoleNotifier;
use crate::sorting::{SortDirection, SortField};
use crate::state::PageState;
use crate::transport::HttpTransport;
use std::env;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Vote { perk_id: String, action: VoteAction },
    Save { target: SaveTarget, id: String },
    Page { href: String },
    Sort { field: SortField, direction: SortDirection },
    Memberships { add: bool, membership_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    command: CliCommand,
    /// Page to mount instead of the command's default.
    from: Option<String>,
}

impl CliCommand {
    fn default_page(&self) -> &'static str {
        match self {
            Self::Vote { .. } | Self::Page { .. } | Self::Sort { .. } => "/perks",
            Self::Save { target: SaveTarget::Perk, .. } => "/perks",
            Self::Save { target: SaveTarget::Membership, .. } => "/memberships",
            Self::Memberships { .. } => "/profile",
        }
    }
}

pub async fn run_from_env() -> Result<(), ClientError> {
    run_from_args(env::args().skip(1).collect()).await
}

pub async fn run_from_args(args: Vec<String>) -> Result<(), ClientError> {
    let invocation = parse_command(args).map_err(ClientError::usage)?;
    let config = ClientConfig::from_env()?;
    let transport = Arc::new(HttpTransport::new(&config)?);

    let path = invocation
        .from
        .as_deref()
        .unwrap_or_else(|| invocation.command.default_page());
    let html = transport.load_page(path).await?;
    let page_config = ClientConfig {
        base_url: config.resolve(path)?,
        ..config
    };
    let page = mount(&html, &page_config, transport, Arc::new(ConsoleNotifier))?;

    execute(&page, invocation.command).await
}

async fn execute(page: &PageState<HttpTransport, ConsoleNotifier>, command: CliCommand) -> Result<(), ClientError> {
    match command {
        CliCommand::Vote { perk_id, action } => {
            let outcome = page.actions.vote(&perk_id, action).await?;
            println!("{outcome:?}");
        }
        CliCommand::Save { target, id } => {
            let outcome = page.actions.save(target, &id).await?;
            println!("{outcome:?}");
        }
        CliCommand::Page { href } => {
            let outcome = page.click_page(&href).await?;
            println!("{outcome:?}");
            print_body(page);
        }
        CliCommand::Sort { field, direction } => {
            let sorter = page
                .sorter
                .as_ref()
                .ok_or_else(|| ClientError::unknown_target("page has no perk snapshot to sort"))?;
            let outcome = sorter.apply(field, direction);
            println!("{outcome:?}");
            print_body(page);
        }
        CliCommand::Memberships { add, membership_id } => {
            let list = page
                .memberships
                .as_ref()
                .ok_or_else(|| ClientError::unknown_target("page has no membership list"))?;
            let outcome = if add {
                list.add(&membership_id).await
            } else {
                list.remove(&membership_id).await
            };
            if let Some(status) = list.status() {
                println!("{status}");
            }
            println!("{}", list.list_html());
            debug!(?outcome, "membership command finished");
        }
    }
    Ok(())
}

fn print_body(page: &PageState<HttpTransport, ConsoleNotifier>) {
    if let Some(body) = page.body_html() {
        println!("{body}");
    }
}

fn parse_command(args: Vec<String>) -> Result<Invocation, String> {
    let mut from = None;
    let mut positional = Vec::new();

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--from" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| "--from requires a path".to_string())?;
                from = Some(value.clone());
            }
            "help" | "--help" | "-h" => return Err(help_text()),
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    let Some((cmd, rest)) = positional.split_first() else {
        return Err(help_text());
    };

    let command = match cmd.as_str() {
        "vote" => parse_vote(rest)?,
        "save-perk" => CliCommand::Save {
            target: SaveTarget::Perk,
            id: single(rest, "save-perk <perk-id>")?,
        },
        "save-membership" => CliCommand::Save {
            target: SaveTarget::Membership,
            id: single(rest, "save-membership <membership-id>")?,
        },
        "page" => CliCommand::Page {
            href: single(rest, "page <href>")?,
        },
        "sort" => parse_sort(rest)?,
        "memberships" => parse_memberships(rest)?,
        other => return Err(format!("unknown command: {other}\n\n{}", help_text())),
    };

    Ok(Invocation { command, from })
}

fn parse_vote(rest: &[String]) -> Result<CliCommand, String> {
    let [perk_id, direction] = rest else {
        return Err("usage: vote <perk-id> up|down".to_string());
    };
    let action = match direction.as_str() {
        "up" => VoteAction::Upvote,
        "down" => VoteAction::Downvote,
        other => return Err(format!("vote direction must be up or down, got '{other}'")),
    };
    Ok(CliCommand::Vote {
        perk_id: perk_id.clone(),
        action,
    })
}

fn parse_sort(rest: &[String]) -> Result<CliCommand, String> {
    let (field, direction) = match rest {
        [field] => (field, None),
        [field, direction] => (field, Some(direction.as_str())),
        _ => return Err("usage: sort <field> [asc|desc]".to_string()),
    };
    if let Some(direction) = direction {
        if !matches!(direction.to_ascii_lowercase().as_str(), "asc" | "desc") {
            return Err(format!("sort direction must be asc or desc, got '{direction}'"));
        }
    }
    let field = field.parse::<SortField>().map_err(|err| err.message)?;
    Ok(CliCommand::Sort {
        field,
        direction: SortDirection::from_param(direction),
    })
}

fn parse_memberships(rest: &[String]) -> Result<CliCommand, String> {
    let [op, membership_id] = rest else {
        return Err("usage: memberships add|remove <membership-id>".to_string());
    };
    let add = match op.as_str() {
        "add" => true,
        "remove" => false,
        other => return Err(format!("memberships takes add or remove, got '{other}'")),
    };
    Ok(CliCommand::Memberships {
        add,
        membership_id: membership_id.clone(),
    })
}

fn single(rest: &[String], usage: &str) -> Result<String, String> {
    match rest {
        [value] => Ok(value.clone()),
        _ => Err(format!("usage: {usage}")),
    }
}

fn help_text() -> String {
    [
        "perk_client - drive PerkManager pages from the terminal",
        "",
        "usage:",
        "  perk_client [--from <path>] <command>",
        "",
        "commands:",
        "  vote <perk-id> up|down",
        "  save-perk <perk-id>",
        "  save-membership <membership-id>",
        "  page <href>",
        "  sort <field> [asc|desc]",
        "  memberships add|remove <membership-id>",
        "",
        "environment:",
        "  PERKMANAGER_URL, PERKMANAGER_SESSION, PERKMANAGER_SORT_DEBOUNCE_MS,",
        "  PERKMANAGER_FLASH_MS, PERKMANAGER_PREFETCH, RUST_LOG",
    ]
    .join("\n")
}
