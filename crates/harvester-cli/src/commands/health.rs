use anyhow::{Result, anyhow, bail};
use harvester_delivery::HttpTransport;
use std::time::Duration;

pub fn execute(receiver: &str) -> Result<()> {
    let transport = HttpTransport::new(receiver, Duration::from_secs(5))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let healthy = runtime
        .block_on(transport.health())
        .map_err(|e| anyhow!("Receiver at {} is not reachable: {}", transport.base_url(), e))?;

    if !healthy {
        bail!("Receiver at {} reported unhealthy", transport.base_url());
    }

    println!("✅ Receiver at {} is healthy", transport.base_url());
    Ok(())
}
