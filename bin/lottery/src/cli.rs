use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Parser;
use lottery_deploy::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "deploy-lottery")]
#[command(
    author,
    version,
    about = "Deploy the lottery contract and print its address"
)]
pub struct Cli {
    /// The verbosity level. Logs are written to stderr.
    #[arg(short, long, env = "LOTTERY_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file.
    ///
    /// A missing file is not an error: defaults and environment variables still apply.
    #[arg(long, alias = "conf", env = "LOTTERY_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,
}

impl Cli {
    /// Load environment variables from `env_file` (or `.env` in the current directory tree),
    /// then parse `args`. Flags backed by environment variables can therefore be set there too.
    pub fn parse_with_env_file<I, T>(
        env_file: Option<&Path>,
        args: I,
    ) -> (Self, dotenvy::Result<PathBuf>)
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let loaded = match env_file {
            Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
            None => dotenvy::dotenv(),
        };
        (Self::parse_from(args), loaded)
    }
}
