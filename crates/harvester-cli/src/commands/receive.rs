use anyhow::Result;
use harvester_delivery::ReceiverServer;
use std::net::SocketAddr;
use std::path::Path;

pub fn execute(port: u16, output: &Path) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let addr: SocketAddr = ([127, 0, 0, 1], port).into();
        let server = ReceiverServer::bind(addr, output).await?;

        println!("✓ Receiver listening on http://{}", server.local_addr()?);
        println!("  Rows are appended to {}/<cid>.jsonl", output.display());
        println!();
        println!("Press Ctrl+C to stop...");
        println!();

        let store = server.run().await?;

        println!();
        println!("🛑 Receiver stopped");
        println!("📊 Accepted {} row(s)", store.accepted());
        Ok::<_, anyhow::Error>(())
    })
}
