// Chrome integration: discovery, launch, CDP connection and the Apollo page adapter

mod apollo;
mod cdp_session;
mod chrome_finder;
mod error;
pub mod js_scripts;
mod launcher;
mod profile;

pub use apollo::{ApolloPage, parse_page_number};
pub use cdp_session::CdpSession;
pub use chrome_finder::ChromeFinder;
pub use error::{Error, Result};
pub use launcher::{ChromeLauncher, DEFAULT_DEBUGGING_PORT, DEFAULT_START_URL};
pub use profile::ProfileManager;
