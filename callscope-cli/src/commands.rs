use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use callscope_capture::{build_manager, CaptureManager};
use callscope_config::CallscopeConfig;
use callscope_core::rtp::standard_encodings;
use callscope_telemetry::{EventLogger, MetricsRecorder};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::tally::PacketTally;

const STATUS_INTERVAL: Duration = Duration::from_millis(250);
const REPORTED_FLOWS: usize = 10;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture from devices, files or a listener until interrupted
    Capture(CaptureArgs),
    /// List the static RTP payload types
    Codecs,
}

/// Command line overrides, applied on top of the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Configuration file (defaults to config/callscope.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Device for live capture
    #[arg(short, long)]
    pub device: Option<String>,
    /// Pcap files to replay
    #[arg(short = 'I', long = "input")]
    pub input_files: Vec<PathBuf>,
    /// Receive mirrored packets on this address
    #[arg(short = 'L', long)]
    pub listen: Option<SocketAddr>,
    /// Archive captured packets to this pcap file
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,
    /// Forward captured packets to this address
    #[arg(short = 'H', long)]
    pub forward: Option<SocketAddr>,
    /// Server whose TLS signaling should be decrypted
    #[arg(long)]
    pub tls_server: Option<SocketAddr>,
    /// Private key used for TLS decryption
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,
    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
    /// Print prometheus metrics on exit
    #[arg(long)]
    pub dump_metrics: bool,
    /// Capture filter expression
    pub filter: Vec<String>,
}

impl CaptureArgs {
    fn apply(self, config: &mut CallscopeConfig) {
        let capture = &mut config.capture;
        if self.device.is_some() {
            capture.device = self.device;
        }
        if !self.input_files.is_empty() {
            capture.input_files = self.input_files;
        }
        if self.listen.is_some() {
            capture.listen = self.listen;
        }
        if self.output.is_some() {
            capture.output_file = self.output;
        }
        if self.forward.is_some() {
            capture.forward = self.forward;
        }
        if self.tls_server.is_some() {
            capture.tls_server = self.tls_server;
        }
        if self.keyfile.is_some() {
            capture.keyfile = self.keyfile;
        }
        if !self.filter.is_empty() {
            capture.filter = Some(self.filter.join(" "));
        }
        if let Some(level) = self.log_level {
            config.telemetry.log_level = level;
        }
        if self.dump_metrics {
            config.telemetry.dump_metrics = true;
        }
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Capture(args) => run_capture(args).await,
        Commands::Codecs => {
            for encoding in standard_encodings() {
                println!("{:>3}  {:<8} {}", encoding.id, encoding.format, encoding.name);
            }
            Ok(())
        }
    }
}

fn load_config(args: CaptureArgs) -> anyhow::Result<CallscopeConfig> {
    let mut config = match &args.config {
        Some(path) => CallscopeConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CallscopeConfig::load()?,
    };
    args.apply(&mut config);
    Ok(config.validated()?)
}

async fn run_capture(args: CaptureArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    EventLogger::init(&config.telemetry.log_level);

    if !config.capture.has_sources() {
        anyhow::bail!("no capture source configured (device, input files or listen address)");
    }

    let metrics = MetricsRecorder::new()?;
    let tally = Arc::new(PacketTally::new());
    let mut manager = build_manager(&config.capture, tally.clone(), metrics.clone())?;
    manager.start()?;

    wait_for_shutdown(&manager).await?;
    tokio::task::block_in_place(|| manager.stop());

    tally.report(REPORTED_FLOWS);
    if config.telemetry.dump_metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

/// Returns on Ctrl-C, or once every source is a file that has been read.
async fn wait_for_shutdown(manager: &CaptureManager) -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    let mut last_status = "";

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("listening for Ctrl-C")?;
                info!("Interrupted, stopping capture");
                return Ok(());
            }
            _ = ticker.tick() => {
                let status = manager.status_desc();
                if status != last_status {
                    info!(status, "Capture status");
                    last_status = status;
                }
                if replay_complete(manager) {
                    info!("All capture files read");
                    return Ok(());
                }
            }
        }
    }
}

fn replay_complete(manager: &CaptureManager) -> bool {
    let summary = manager.summary();
    summary.online == 0 && summary.offline > 0 && summary.loading == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_override_loaded_config() {
        let cli = Cli::parse_from([
            "callscope",
            "capture",
            "-d",
            "eth0",
            "-I",
            "a.pcap",
            "-I",
            "b.pcap",
            "--log-level",
            "debug",
            "udp",
            "port",
            "5060",
        ]);
        let Commands::Capture(args) = cli.command else {
            panic!("expected capture command");
        };

        let mut config = CallscopeConfig::default();
        args.apply(&mut config);

        assert_eq!(config.capture.device.as_deref(), Some("eth0"));
        assert_eq!(config.capture.input_files.len(), 2);
        assert_eq!(config.capture.filter.as_deref(), Some("udp port 5060"));
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(config.validated().is_ok());
    }

    #[test]
    fn absent_args_keep_config_values() {
        let mut config = CallscopeConfig::default();
        config.capture.device = Some("eth1".into());
        config.capture.filter = Some("sip".into());

        CaptureArgs::default().apply(&mut config);

        assert_eq!(config.capture.device.as_deref(), Some("eth1"));
        assert_eq!(config.capture.filter.as_deref(), Some("sip"));
    }
}
