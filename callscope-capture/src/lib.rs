//! # callscope-capture
//!
//! Capture orchestration: pluggable packet sources and sinks driven by one
//! dedicated capture thread, feeding a session store.
//!
//! ### Sources
//! - `LiveSource`: pcap device capture
//! - `OfflineSource`: pcap file replay
//! - `ListenerSource`: UDP listener for mirrored packets
//!
//! ### Sinks
//! - `PcapWriterSink`: pcap archive
//! - `ForwarderSink`: UDP relay

pub mod error;
pub mod event_loop;
pub mod manager;
pub mod setup;
pub mod sink;
pub mod source;
pub mod status;
pub mod store;

pub use error::CaptureError;
pub use manager::CaptureManager;
pub use setup::build_manager;
pub use sink::CaptureSink;
pub use source::{CaptureMode, CaptureSource, SourceContext, SourcePoll};
pub use status::{SourceSummary, StatusCategory};
pub use store::SessionStore;
