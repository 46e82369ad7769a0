//! Human readable capture status shown in the UI header.

/// Source counts a status line is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSummary {
    pub online: usize,
    pub offline: usize,
    /// Offline sources still reading their file.
    pub loading: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Online,
    Offline,
    Mixed,
}

impl SourceSummary {
    pub fn category(&self) -> StatusCategory {
        match (self.online > 0, self.offline > 0) {
            (true, false) => StatusCategory::Online,
            (false, true) => StatusCategory::Offline,
            _ => StatusCategory::Mixed,
        }
    }

    /// Pause takes precedence over loading.
    pub fn description(&self, paused: bool) -> &'static str {
        use StatusCategory::*;

        match (self.category(), paused, self.loading > 0) {
            (Online, true, _) => "Online (Paused)",
            (Offline, true, _) => "Offline (Paused)",
            (Mixed, true, _) => "Mixed (Paused)",
            (Online, false, true) => "Online (Loading)",
            (Offline, false, true) => "Offline (Loading)",
            (Mixed, false, true) => "Mixed (Loading)",
            (Online, false, false) => "Online",
            (Offline, false, false) => "Offline",
            (Mixed, false, false) => "Mixed",
        }
    }
}
