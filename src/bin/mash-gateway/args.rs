use std::path::PathBuf;

use clap::Parser;

/// Gateway for the MASH relay/sensor node.
#[derive(Debug, Parser)]
#[command(name = "mash-gateway", version)]
pub struct Args {
    /// Serial device wired to the node.
    #[arg(long, env = "MASH_SERIAL_PORT", default_value = "/dev/ttyUSB0")]
    pub port: String,

    #[arg(long, env = "MASH_BAUD", default_value_t = 9600)]
    pub baud: u32,

    /// Gateway configuration (JSON).  Defaults apply if the file is missing.
    #[arg(long, env = "MASH_CONFIG", default_value = "mash-gateway.json")]
    pub config: PathBuf,

    /// Append readings and actuator changes here as JSON lines.
    #[arg(long, env = "MASH_RECORDS")]
    pub records: Option<PathBuf>,

    /// Accept operator commands on stdin.
    #[arg(long, env = "MASH_CONSOLE")]
    pub console: bool,
}
