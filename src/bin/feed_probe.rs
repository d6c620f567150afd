//! Fetch every feed once and print what the chat commands would show.
//! Usage: feed_probe [rewards-file]

use chrono::Utc;
use warbot::filter::FilterSet;
use warbot::listing;
use warbot::{EventSource, FeedUrls, HttpEventSource, RewardFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let filter = match std::env::args().nth(1) {
        Some(path) => RewardFilter::open(path)?.current(),
        None => std::sync::Arc::new(FilterSet::default()),
    };
    let source = HttpEventSource::new(FeedUrls::default()).with_timeout(15);
    let now = Utc::now();

    println!("== alerts ({} rewards in filter)", filter.len());
    match source.fetch_alerts().await {
        Ok(a) => println!("{}", listing::render_alerts(&a, &filter, filter.is_empty(), now)),
        Err(e) => println!("error: {e}"),
    }

    println!("\n== invasions");
    match source.fetch_invasions().await {
        Ok(i) => println!("{}", listing::render_invasions(&i, &filter, filter.is_empty())),
        Err(e) => println!("error: {e}"),
    }

    println!("\n== darvo");
    match source.fetch_deals().await {
        Ok(d) => println!("{}", listing::render_deals(&d, now)),
        Err(e) => println!("error: {e}"),
    }

    println!("\n== news");
    match source.fetch_news().await {
        Ok(n) => println!("{}", listing::render_news(&n, now)),
        Err(e) => println!("error: {e}"),
    }

    Ok(())
}
