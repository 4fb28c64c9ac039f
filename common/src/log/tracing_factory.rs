use std::sync::Once;

use tracing::Level;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub enum OutputType {
    Stdout,
    File,
}

#[derive(Debug, Clone)]
pub struct TracingFactoryOptions {
    pub debug: bool,
    pub output_type: OutputType,
    pub level: Level,
    pub log_dir: Option<String>,
}

impl Default for TracingFactoryOptions {
    fn default() -> Self {
        Self {
            debug: false,
            output_type: OutputType::Stdout,
            level: Level::INFO,
            log_dir: None,
        }
    }
}

impl TracingFactoryOptions {
    pub fn new_with_debug(debug: bool) -> Self {
        Self {
            debug,
            level: if debug { Level::DEBUG } else { Level::INFO },
            ..Default::default()
        }
    }
}

/// Process-wide `tracing` subscriber setup. `init_log`/`init_log_with_options`
/// are idempotent: the first call wins, later calls are no-ops so test
/// binaries and the server binary can both call it freely.
#[derive(Debug, Clone, Default)]
pub struct TracingFactory {
    options: TracingFactoryOptions,
}

impl TracingFactory {
    pub fn init_log(debug: bool) -> Self {
        Self::init_log_with_options(TracingFactoryOptions::new_with_debug(debug))
    }

    pub fn init_log_with_options(opts: TracingFactoryOptions) -> Self {
        INIT.call_once(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(opts.level.to_string()));

            match &opts.output_type {
                OutputType::Stdout => {
                    let subscriber = Registry::default()
                        .with(env_filter)
                        .with(fmt::layer().with_target(true));
                    subscriber.init();
                }
                OutputType::File => {
                    let dir = opts
                        .log_dir
                        .clone()
                        .unwrap_or_else(|| "/tmp/sqlsrv/logs".to_string());
                    let file_appender = rolling::daily(dir, "server.log");
                    let (non_blocking_writer, guard) = non_blocking(file_appender);
                    // Leak the guard: logging must outlive the init call for
                    // the lifetime of the process.
                    std::mem::forget(guard);
                    let subscriber = Registry::default().with(env_filter).with(
                        fmt::layer().with_writer(non_blocking_writer.and(std::io::stdout)),
                    );
                    subscriber.init();
                }
            }
        });

        Self { options: opts }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        TracingFactory::init_log(true);
        TracingFactory::init_log(false);
        tracing::info!("tracing factory smoke test");
    }
}
