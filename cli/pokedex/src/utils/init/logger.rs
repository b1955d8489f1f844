use std::sync::OnceLock;

use tracing::{debug, error};
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;

static LOGGER_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();

/// Filter directives for a verbosity level.
///
/// `RUST_LOG` takes precedence over these, see [update_filters].
fn log_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,pokedex=error,pokedex_sdk=error,pokedex_catalog=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,pokedex=warn,pokedex_sdk=warn,pokedex_catalog=warn",
        // Show our own info logs
        Verbosity::Verbose(1) => "off,pokedex=info,pokedex_sdk=info,pokedex_catalog=info",
        // Also show debug from our libraries
        Verbosity::Verbose(2) => "off,pokedex=debug,pokedex_sdk=debug,pokedex_catalog=debug",
        // Also show trace from our libraries
        Verbosity::Verbose(3) => "off,pokedex=trace,pokedex_sdk=trace,pokedex_catalog=trace",
        // Also show debug from dependencies (reqwest, hyper, ...)
        Verbosity::Verbose(4) => "debug,pokedex=trace,pokedex_sdk=trace,pokedex_catalog=trace",
        Verbosity::Verbose(_) => "trace",
    }
}

pub(crate) fn init_logger(verbosity: Option<Verbosity>) {
    let verbosity = verbosity.unwrap_or_default();

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (subscriber, reload_handle) = create_registry_and_filter_reload_handle();
        subscriber.init();
        reload_handle
    });

    update_filters(filter_handle, log_filter(verbosity));
}

pub fn update_filters(filter_handle: &Handle<EnvFilter, Registry>, log_filter: &str) {
    let result = filter_handle.modify(|layer| {
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter)) {
            Ok(new_filter) => *layer = new_filter,
            Err(err) => {
                error!("Updating logger filter failed: {}", err);
            },
        };
    });
    if let Err(err) = result {
        error!("Updating logger filter failed: {}", err);
    }
}

fn create_registry_and_filter_reload_handle() -> (
    impl SubscriberInitExt,
    Handle<EnvFilter, Registry>,
) {
    // Start permissive, the actual level is set through the reload handle.
    let filter = EnvFilter::new("trace");
    let (filter, filter_reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(tracing_subscriber::fmt::format())
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(log_layer);
    debug!("initialized logger");

    (registry, filter_reload_handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_filters_parse() {
        let levels = [
            Verbosity::Quiet,
            Verbosity::Verbose(0),
            Verbosity::Verbose(1),
            Verbosity::Verbose(2),
            Verbosity::Verbose(3),
            Verbosity::Verbose(4),
            Verbosity::Verbose(10),
        ];
        for verbosity in levels {
            EnvFilter::try_new(log_filter(verbosity)).unwrap();
        }
    }

    #[test]
    fn default_verbosity_shows_warnings() {
        assert!(log_filter(Verbosity::default()).contains("pokedex_sdk=warn"));
    }
}
