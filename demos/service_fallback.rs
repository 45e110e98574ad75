//! Uses tower services as implementations and drives the chain as a tower service.
use std::time::Duration;
use tower::{service_fn, Service, ServiceExt};
use tryfallback::Fallback;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fast = service_fn(|req: &'static str| async move {
        if req == "slow" {
            tokio::time::sleep(Duration::from_millis(200)).await;
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "fast path gave up"));
        }
        Ok(format!("fast:{req}"))
    });
    let slow = service_fn(|req: &'static str| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, std::io::Error>(format!("slow:{req}"))
    });

    let mut svc = Fallback::builder()
        .service("fast", fast)
        .service("slow", slow)
        .on_error(|name: &&str, err: &std::io::Error| eprintln!("{name} failed: {err}"))
        .build();

    let (name, body) = svc.ready().await?.call("ok").await?;
    println!("{name} answered {body}");

    let (name, body) = svc.ready().await?.call("slow").await?;
    println!("{name} answered {body}");

    Ok(())
}
