//! Builds a [`CaptureManager`] from configuration.

use std::path::Path;
use std::sync::Arc;

use callscope_config::CaptureConfig;
use callscope_telemetry::MetricsRecorder;
use pcap::Linktype;
use tracing::info;

use crate::error::CaptureError;
use crate::manager::CaptureManager;
use crate::sink::{ForwarderSink, PcapWriterSink};
use crate::source::{ListenerSource, LiveSource, OfflineSource};
use crate::store::SessionStore;

/// Opens every configured source and sink and applies the startup filter.
///
/// The archive file takes the link type of the pcap sources, Ethernet when
/// there are none. Archiving is refused when sources produce frames of
/// different link types, or bare datagrams from a listener, since one pcap
/// file carries a single link type.
pub fn build_manager(
    config: &CaptureConfig,
    store: Arc<dyn SessionStore>,
    metrics: MetricsRecorder,
) -> Result<CaptureManager, CaptureError> {
    if let (Some(path), Some(addr)) = (&config.output_file, config.listen) {
        return Err(CaptureError::Archive {
            path: path.clone(),
            reason: format!("listener {addr} yields datagrams without link headers"),
        });
    }

    let manager = CaptureManager::new(config, store, metrics);
    let mut linktypes = Vec::new();

    if let Some(device) = &config.device {
        let source = LiveSource::open(
            device,
            config.snaplen,
            config.promiscuous,
            config.poll_timeout_ms,
        )?;
        linktypes.push(source.linktype());
        manager.add_source(source);
    }

    for path in &config.input_files {
        let source = OfflineSource::open(path)?;
        linktypes.push(source.linktype());
        manager.add_source(source);
    }

    if let Some(addr) = config.listen {
        manager.add_source(ListenerSource::bind(addr)?);
    }

    if let Some(path) = &config.output_file {
        let linktype = archive_linktype(path, &linktypes)?;
        manager.add_sink(PcapWriterSink::create(path, linktype)?);
    }

    if let Some(addr) = config.forward {
        manager.add_sink(ForwarderSink::connect(addr)?);
    }

    if let Some(filter) = &config.filter {
        manager.set_filter(filter)?;
    }

    info!(
        sources = manager.sources_count(),
        status = manager.status_desc(),
        "Capture manager ready"
    );
    Ok(manager)
}

fn archive_linktype(path: &Path, linktypes: &[Linktype]) -> Result<Linktype, CaptureError> {
    let Some((&first, rest)) = linktypes.split_first() else {
        return Ok(Linktype::ETHERNET);
    };
    match rest.iter().find(|&&other| other != first) {
        Some(other) => Err(CaptureError::Archive {
            path: path.to_path_buf(),
            reason: format!("sources mix link types {first:?} and {other:?}"),
        }),
        None => Ok(first),
    }
}
