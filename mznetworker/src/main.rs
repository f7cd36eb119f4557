use std::fs;
use std::io;
use std::path::Path;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mznetworker::{MZNetworker, MZNetworkerError};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn configure_log(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .compact()
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_writer(io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        );

    let (file_layer, guard) = match log_file {
        Some(path) => {
            mznetwork::export::ensure_parent_directory(path)?;
            let (writer, guard) = tracing_appender::non_blocking(fs::File::create(path)?);
            let layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::DEBUG.into())
                        .from_env_lossy(),
                );
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    // mzdata reports through `log`
    tracing_log::LogTracer::init().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(guard)
}

fn main() -> Result<(), MZNetworkerError> {
    let args = MZNetworker::parse();

    let mut config = Figment::from(Serialized::defaults(&args))
        .merge(Toml::file("mznetworker.toml"));
    if let Some(config_file) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(config_file));
    }
    config = config.merge(Env::prefixed("MZNETWORKER_"));
    let driver: MZNetworker = config.extract()?;
    driver.validate()?;

    let _guard = configure_log(driver.log_file.as_deref())?;
    driver.main()?;
    Ok(())
}
