use crate::BrowserArgs;
use anyhow::Result;
use harvester_browser::{
    ApolloPage, CdpSession, ChromeFinder, ChromeLauncher, DEFAULT_START_URL, ProfileManager,
};
use std::path::Path;
use std::process::Child;

/// Chrome connection kept alive for the length of a command
pub struct BrowserHandle {
    _session: CdpSession,
    profile: Option<ProfileManager>,
    chrome: Option<Child>,
}

impl BrowserHandle {
    /// Close a Chrome we launched with a throwaway profile; persistent ones keep running
    pub fn close(mut self) {
        let temporary = self.profile.as_ref().is_some_and(ProfileManager::is_temporary);
        if let Some(chrome) = self.chrome.as_mut()
            && temporary
        {
            tracing::debug!("Stopping Chrome (pid {})", chrome.id());
            let _ = chrome.kill();
            let _ = chrome.wait();
        }
    }
}

/// Attach to or launch Chrome and return the Apollo tab
pub async fn open(args: &BrowserArgs, home: &Path) -> Result<(BrowserHandle, ApolloPage)> {
    let start_url = args.url.clone().unwrap_or_else(|| DEFAULT_START_URL.to_string());

    let (port, profile, chrome) = match args.connect {
        Some(port) => {
            println!("🔌 Attaching to Chrome on port {}", port);
            (port, None, None)
        }
        None => {
            println!("🔍 Locating Chrome...");
            let chrome_binary = ChromeFinder::new(args.chrome_path.clone()).find()?;
            println!("✅ Found Chrome at: {}", chrome_binary.display());

            let profile = if args.temp {
                println!("📁 Using temporary profile");
                ProfileManager::temporary()?
            } else {
                let profile = ProfileManager::named(home, &args.profile)?;
                println!("📁 Using profile: {}", profile.path().display());
                profile
            };

            let launcher = ChromeLauncher::new(chrome_binary, profile.path().to_path_buf())
                .with_start_url(&start_url)
                .with_debugging_port(args.debugging_port);
            println!("🚀 Launching Chrome...");
            let child = launcher.launch()?;
            (launcher.debugging_port(), Some(profile), Some(child))
        }
    };

    let session = CdpSession::connect(port).await?;
    let page = session.find_page("apollo.io", &start_url).await?;

    Ok((
        BrowserHandle {
            _session: session,
            profile,
            chrome,
        },
        ApolloPage::new(page),
    ))
}
