pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod markup;
pub mod memberships;
pub mod models;
pub mod notify;
pub mod sorting;
pub mod state;
pub mod table;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod test_support;

pub use app::mount;
pub use config::ClientConfig;
pub use errors::{ClientError, ErrorKind};
pub use state::PageState;
pub use transport::{HttpTransport, Transport};
