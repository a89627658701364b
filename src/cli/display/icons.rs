//! Status icons for CLI output

/// Status icons for different states
pub struct StatusIcon;

impl StatusIcon {
    /// Kind synced with objects
    pub const SUCCESS: &'static str = "✓";

    /// Kind synced but holds nothing
    pub const EMPTY: &'static str = "○";

    /// Kind failed to sync
    pub const ERROR: &'static str = "✗";

    /// Get icon for a sync result
    pub fn sync_icon(count: Option<usize>) -> &'static str {
        match count {
            None => Self::ERROR,
            Some(0) => Self::EMPTY,
            Some(_) => Self::SUCCESS,
        }
    }

    /// Get status text for a sync result
    pub fn sync_text(count: Option<usize>) -> &'static str {
        match count {
            None => "Failed",
            Some(0) => "Empty",
            Some(_) => "Synced",
        }
    }
}
