use clap::Parser;

/// Aurora Bridge - polls an Aurora PV inverter through a WiFi bridge
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Optional runtime limit in seconds
    #[clap(short = 't', long = "time")]
    pub runtime: Option<u64>,

    /// Poll once and exit, whatever the scheduler is configured to do
    #[clap(long)]
    pub once: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}

