use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mznetwork::{
    generate_molecular_network, read_spectra, MolecularNetworkError, MolecularNetworkParams,
};

fn non_negative_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if !value.is_finite() {
        Err(format!("`{s}` is not a finite number"))
    } else if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

fn unit_interval_f64(s: &str) -> Result<f64, String> {
    let value = non_negative_float_f64(s)?;
    if value > 1.0 {
        Err(format!("`{s}` is greater than one"))
    } else {
        Ok(value)
    }
}

#[derive(Debug, Error)]
pub enum MZNetworkerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read spectra from {0}: {1}")]
    InputError(String, #[source] io::Error),
    #[error("No MSn spectra were found in {0}")]
    NoSpectraError(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Failed to build the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
    #[error("Failed to load the configuration: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error(transparent)]
    MolecularNetworkError(#[from] MolecularNetworkError),
}

/// Build a molecular network from a file of tandem mass spectra.
///
/// Read the MSn spectra of an MGF or mzML file, link spectra whose modified cosine
/// similarity is high enough, and write out the network and the molecular family
/// of each spectrum.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct MZNetworker {
    /// The path to read the input spectra from
    #[arg()]
    pub input_file: String,

    /// The path to write the network to.
    ///
    /// Paths ending in `.json` or `.cyjs` are written as Cytoscape JSON, all others
    /// as GraphML.
    #[arg(
        short = 'g',
        long = "graph-output-file",
        default_value = "molecular_network.graphml"
    )]
    pub graph_output_file: PathBuf,

    /// The path to write the tab-separated component table to
    #[arg(
        short = 'c',
        long = "component-output-file",
        default_value = "molecular_network_components.tsv"
    )]
    pub component_output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mznetworker.toml` in the working directory.
    /// Environment variables prefixed with `MZNETWORKER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The m/z tolerance in Daltons for matching fragment peaks
    #[arg(
        short = 'e',
        long = "msms-mz-tol",
        default_value_t = 0.01,
        value_parser = non_negative_float_f64
    )]
    pub msms_mz_tol: f64,

    /// The minimum similarity score for two spectra to be linked
    #[arg(
        short = 's',
        long = "score-cutoff",
        default_value_t = 0.7,
        value_parser = unit_interval_f64
    )]
    pub score_cutoff: f64,

    /// The number of most similar spectra to consider linking each spectrum to
    #[arg(short = 'n', long = "top-n", default_value_t = 10)]
    pub top_n: usize,

    /// The maximum number of links to add for each spectrum.
    ///
    /// Must not be greater than `--top-n`.
    #[arg(short = 'm', long = "max-links", default_value_t = 10)]
    pub max_links: usize,
}

impl Default for MZNetworker {
    fn default() -> Self {
        let params = MolecularNetworkParams::default();
        Self {
            input_file: String::new(),
            graph_output_file: PathBuf::from("molecular_network.graphml"),
            component_output_file: PathBuf::from("molecular_network_components.tsv"),
            log_file: None,
            config_file: None,
            threads: -1,
            msms_mz_tol: params.msms_mz_tol,
            score_cutoff: params.score_cutoff,
            top_n: params.top_n,
            max_links: params.max_links,
        }
    }
}

impl MZNetworker {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZNetworkerError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(pool)
    }

    /// Check the numeric parameters again, as values read from configuration files
    /// or the environment never pass through the argument parser.
    pub fn validate(&self) -> Result<(), MZNetworkerError> {
        if !(self.msms_mz_tol.is_finite() && self.msms_mz_tol >= 0.0) {
            return Err(MZNetworkerError::InvalidParameter(format!(
                "msms_mz_tol must be a non-negative number, received {}",
                self.msms_mz_tol
            )));
        }
        if !(0.0..=1.0).contains(&self.score_cutoff) {
            return Err(MZNetworkerError::InvalidParameter(format!(
                "score_cutoff must lie between 0 and 1, received {}",
                self.score_cutoff
            )));
        }
        Ok(())
    }

    pub fn network_params(&self) -> MolecularNetworkParams {
        MolecularNetworkParams::new(
            self.msms_mz_tol,
            self.score_cutoff,
            self.top_n,
            self.max_links,
        )
    }

    pub fn main(&self) -> Result<(), MZNetworkerError> {
        self.validate()?;
        info!(
            "mznetworker v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Graph Output: {}", self.graph_output_file.display());
        info!("Component Output: {}", self.component_output_file.display());
        match toml::to_string_pretty(self) {
            Ok(config) => debug!("Effective configuration:\n{config}"),
            Err(e) => warn!("Failed to render the configuration: {e}"),
        }
        self.create_threadpool()?.install(|| self.run())
    }

    fn run(&self) -> Result<(), MZNetworkerError> {
        let start = Instant::now();
        let spectra = read_spectra(&self.input_file)
            .map_err(|e| MZNetworkerError::InputError(self.input_file.clone(), e))?;
        if spectra.is_empty() {
            return Err(MZNetworkerError::NoSpectraError(self.input_file.clone()));
        }
        info!("MSn Spectra: {}", spectra.len());

        let table = generate_molecular_network(
            &spectra,
            &self.graph_output_file,
            &self.component_output_file,
            &self.network_params(),
        )?;

        info!("Nodes: {}", table.len());
        info!(
            "Components: {} | Singletons: {}",
            table.component_count(),
            table.singleton_count()
        );
        let elapsed = Instant::now() - start;
        info!("Total Elapsed Time: {:0.3?}", elapsed);
        Ok(())
    }
}
