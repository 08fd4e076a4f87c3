use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "probescope")]
#[command(version)]
#[command(about = "Port scanner with adaptive probing and protocol fingerprinting", long_about = None)]
pub struct Cli {
    #[arg(required = true, help = "Target IP, hostname, IP range (IP1-IP2), or CIDR (192.168.1.0/24). Can be specified multiple times.")]
    pub targets: Vec<String>,

    #[arg(short, long, allow_hyphen_values = true, help = "Ports to scan: 22,80,443 or 1-1000, '-' for all ports, 'default' or 'top100'")]
    pub ports: Option<String>,

    #[arg(long, help = "Try the whole probe catalog on every open port, best-performing probes first")]
    pub deep: bool,

    #[arg(long, default_value_t = 0, help = "Maximum probes per port in deep mode (0 = no limit)")]
    pub depth: usize,

    #[arg(long, help = "Connect timeout per port in milliseconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Maximum concurrent connections")]
    pub concurrency: Option<usize>,

    #[arg(long, value_name = "PATH", help = "Engine configuration file (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Probe statistics file")]
    pub stats: Option<PathBuf>,

    #[arg(long, conflicts_with = "stats", help = "Keep probe statistics in memory only")]
    pub no_stats: bool,

    #[arg(long, help = "Print the probe hit-rate table after the scan")]
    pub stats_report: bool,

    #[arg(short = 'o', long, value_enum, default_value = "human", help = "Output format")]
    pub output_format: OutputFormat,

    #[arg(short = 'f', long, help = "Output file path")]
    pub output_file: Option<PathBuf>,

    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v debug, -vv trace)")]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    #[value(name = "human", help = "Human-readable output")]
    Human,
    #[value(name = "json", help = "JSON output")]
    Json,
}
