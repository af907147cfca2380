//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "weir",
    version = build_info::version(),
    long_version = build_info::build_id(),
    about = "Configurable stream-processing service with end-to-end acknowledgements"
)]
pub struct Cli {
    /// Path to a configuration file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Lint the target configuration file, then exit.
    #[arg(long)]
    pub lint: bool,

    /// Treat lint warnings as startup failures.
    #[arg(long)]
    pub strict: bool,

    /// Print the loaded configuration as YAML, then exit.
    #[arg(long)]
    pub print_yaml: bool,

    /// Print the loaded configuration as JSON, then exit.
    #[arg(long)]
    pub print_json: bool,

    /// Print the full configuration rather than the sanitised form.
    #[arg(long)]
    pub all: bool,

    /// Run in streams mode: streams are created, updated and removed
    /// via the admin API, and the config's stream sections are ignored.
    #[arg(long)]
    pub streams: bool,

    /// Directory of stream configuration files to load in streams
    /// mode; each filename less its extension becomes a stream id.
    #[arg(long)]
    pub streams_dir: Option<PathBuf>,

    /// Print available input types, then exit.
    #[arg(long)]
    pub list_inputs: bool,

    /// Print available processor types, then exit.
    #[arg(long)]
    pub list_processors: bool,

    /// Print available output types, then exit.
    #[arg(long)]
    pub list_outputs: bool,

    /// Print available buffer types, then exit.
    #[arg(long)]
    pub list_buffers: bool,

    /// Print available condition types, then exit.
    #[arg(long)]
    pub list_conditions: bool,

    /// Print available cache types, then exit.
    #[arg(long)]
    pub list_caches: bool,

    /// Print available rate limit types, then exit.
    #[arg(long)]
    pub list_rate_limits: bool,
}

impl Cli {
    /// True when any listing flag short-circuits normal startup.
    pub fn wants_listing(&self) -> bool {
        self.list_inputs
            || self.list_processors
            || self.list_outputs
            || self.list_buffers
            || self.list_conditions
            || self.list_caches
            || self.list_rate_limits
    }
}
