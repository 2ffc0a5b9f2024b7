//! Tracing subscriber with a level that can be changed after startup
//!
//! The subscriber is installed before the configuration is read, so config
//! loading is logged at the default level. The configured level is applied
//! afterwards through [`LogHandle::set_level`].

use tracing::{Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

/// Changes the maximum level of the installed subscriber
#[derive(Clone, Debug)]
pub struct LogHandle(reload::Handle<LevelFilter, Registry>);

impl LogHandle {
    pub fn set_level(&self, level: Level) -> Result<(), reload::Error> {
        self.0.modify(|filter| *filter = LevelFilter::from_level(level))
    }

    /// Current maximum level, `None` once the subscriber is gone
    pub fn level(&self) -> Option<LevelFilter> {
        self.0.clone_current()
    }
}

/// Pretty stdout subscriber filtered at `initial`
pub fn subscriber(initial: Level) -> (impl Subscriber + Send + Sync + 'static, LogHandle) {
    let (filter, handle) = reload::Layer::new(LevelFilter::from_level(initial));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );
    (subscriber, LogHandle(handle))
}

/// Installs [`subscriber`] as the global default
pub fn init(initial: Level) -> LogHandle {
    let (subscriber, handle) = subscriber(initial);
    subscriber.init();
    handle
}
