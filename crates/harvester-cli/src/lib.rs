use clap::{Args, ValueEnum};
use harvester_browser::DEFAULT_DEBUGGING_PORT;
use harvester_core::DeliveryMode;
use std::path::PathBuf;

pub mod commands;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    /// Stream rows to the receiver as they are scraped
    Realtime,
    /// Collect rows and write a CSV when the session ends
    Save,
}

impl From<ModeArg> for DeliveryMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Realtime => DeliveryMode::Realtime,
            ModeArg::Save => DeliveryMode::Save,
        }
    }
}

/// How to reach the browser running Apollo
#[derive(Args, Clone, Debug)]
pub struct BrowserArgs {
    /// Attach to a Chrome already listening on this debugging port
    #[arg(long, value_name = "PORT", conflicts_with_all = ["profile", "temp"])]
    pub connect: Option<u16>,

    /// Path to the Chrome binary
    #[arg(long, env = "HARVESTER_CHROME_PATH", value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Named profile kept under the harvester home
    #[arg(long, value_name = "NAME", default_value = "default", conflicts_with = "temp")]
    pub profile: String,

    /// Use a throwaway profile
    #[arg(long)]
    pub temp: bool,

    /// Page to open when launching Chrome
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Debugging port for a launched Chrome
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_DEBUGGING_PORT)]
    pub debugging_port: u16,
}
