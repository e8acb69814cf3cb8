use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "mindful=debug,mindful_core=debug,tower_http=debug";

/// Install the global subscriber.
///
/// An explicit filter wins, then `RUST_LOG`, then [`DEFAULT_FILTER`].
pub fn init(filter: Option<&str>) {
    let directives = filter
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(EnvFilter::new(directives))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
