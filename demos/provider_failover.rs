//! Fails over between three quote providers, logging each failure and every fallback event.
use std::time::Duration;
use tryfallback::telemetry::{LogSink, MemorySink, MulticastSink};
use tryfallback::{Fallback, TracingObserver};

#[derive(Debug)]
struct ProviderError(&'static str);

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "provider error: {}", self.0)
    }
}

impl std::error::Error for ProviderError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let history = MemorySink::new();
    let quotes = Fallback::builder()
        .implementation("exchange-feed", |symbol: String| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<f64, _>(ProviderError(if symbol.len() > 3 { "unknown symbol" } else { "stale" }))
        })
        .implementation("aggregator", |symbol: String| async move {
            if symbol == "ACME" {
                Err(ProviderError("rate limited"))
            } else {
                Ok(101.25)
            }
        })
        .implementation("last-close", |_symbol: String| async { Ok(99.5) })
        .observer(TracingObserver)
        .with_telemetry(MulticastSink::new(LogSink, history.clone()))
        .build();

    for symbol in ["XYZ", "ACME"] {
        let (provider, price) = quotes.execute(symbol.to_string()).await?;
        println!("{symbol}: {price} (from {provider})");
    }

    // XYZ: one failure and a success. ACME: two failures and a success.
    history.wait_for(5).await;
    println!("recorded {} fallback events", history.len());
    Ok(())
}
