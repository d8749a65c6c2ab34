//! Live tail - connect to a robot and print every decoded entry.
//!
//! ```text
//! cargo run --example live_tail -- 10.12.34.2
//! cargo run --example live_tail -- 127.0.0.1 5810
//! ```

use rlog_engine::live::{LiveEvent, LiveSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rlog_engine=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let host = args.get(1).map(String::as_str).unwrap_or("127.0.0.1");
    let mut builder = LiveSession::builder();
    if let Some(port) = args.get(2) {
        builder = builder.port(port.parse()?);
    }

    let mut session = builder.connect_host(host).await?;
    while let Some(event) = session.recv().await {
        match event {
            LiveEvent::Entries(entries) => {
                for entry in entries {
                    println!("{:.3}", entry.timestamp);
                    for update in &entry.updates {
                        match &update.value {
                            Some(value) => println!("  {} = {:?}", update.key, value),
                            None => println!("  {} = null", update.key),
                        }
                    }
                }
            }
            LiveEvent::Closed(reason) => println!("closed: {:?}", reason),
            LiveEvent::Error(e) => return Err(e.into()),
        }
    }
    Ok(())
}
