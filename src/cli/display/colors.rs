//! Color theme for CLI output

use comfy_table::Color as TableColor;

/// Color theme for terminal output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    /// Namespaced kinds in the info color, cluster-scoped ones stand out
    pub fn scope_color(&self, namespaced: bool) -> TableColor {
        if namespaced {
            self.info
        } else {
            self.warning
        }
    }

    /// Get color based on how many objects a kind synced; `None` means it failed
    pub fn sync_color(&self, count: Option<usize>) -> TableColor {
        match count {
            None => self.error,
            Some(0) => self.muted,
            Some(_) => self.success,
        }
    }
}
