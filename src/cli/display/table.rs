//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::infrastructure::kubernetes::ResourceMapping;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use kube::api::DynamicObject;

/// Outcome of warming one kind in the cache
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub kind: String,
    /// Objects in the cache, or `None` if the kind failed to sync
    pub count: Option<usize>,
    pub detail: String,
}

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    /// Create a new table renderer with default theme
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    fn table() -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }

    fn title(label: &str, count: usize, noun: &str) -> String {
        format!(
            "╭─ {} {} ─╮\n",
            label,
            format!("[{} {}]", count, noun).bright_black()
        )
    }

    /// Render registered kinds
    pub fn render_types(&self, mappings: &[&ResourceMapping]) -> String {
        if mappings.is_empty() {
            return "No kinds registered".to_string();
        }

        let mut table = Self::table();
        table.set_header(vec![
            Cell::new("KIND").set_alignment(CellAlignment::Left),
            Cell::new("API VERSION").set_alignment(CellAlignment::Left),
            Cell::new("RESOURCE").set_alignment(CellAlignment::Left),
            Cell::new("SCOPE").set_alignment(CellAlignment::Center),
        ]);

        for mapping in mappings {
            table.add_row(vec![
                Cell::new(&mapping.resource.kind),
                Cell::new(&mapping.resource.api_version),
                Cell::new(&mapping.resource.plural),
                Cell::new(scope_text(mapping.namespaced))
                    .fg(self.theme.scope_color(mapping.namespaced)),
            ]);
        }

        let mut output = Self::title("Registered Kinds", mappings.len(), "kinds");
        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    /// Render a single kind's resolution
    pub fn render_resolution(&self, mapping: &ResourceMapping) -> String {
        let mut table = Self::table();
        table.add_row(vec![Cell::new("Kind"), Cell::new(&mapping.resource.kind)]);
        table.add_row(vec![
            Cell::new("API Version"),
            Cell::new(&mapping.resource.api_version),
        ]);
        table.add_row(vec![Cell::new("Resource"), Cell::new(&mapping.resource.plural)]);
        table.add_row(vec![
            Cell::new("Scope"),
            Cell::new(scope_text(mapping.namespaced))
                .fg(self.theme.scope_color(mapping.namespaced)),
        ]);
        table.to_string()
    }

    /// Render objects of one kind
    pub fn render_objects(&self, kind: &str, objects: &[DynamicObject]) -> String {
        if objects.is_empty() {
            return format!("No {} objects found", kind);
        }

        let mut table = Self::table();
        table.set_header(vec![
            Cell::new("NAME").set_alignment(CellAlignment::Left),
            Cell::new("NAMESPACE").set_alignment(CellAlignment::Left),
            Cell::new("RESOURCE VERSION").set_alignment(CellAlignment::Right),
            Cell::new("LABELS").set_alignment(CellAlignment::Left),
        ]);

        for obj in objects {
            let labels = obj
                .metadata
                .labels
                .as_ref()
                .map(|labels| {
                    labels
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();

            table.add_row(vec![
                Cell::new(obj.metadata.name.as_deref().unwrap_or("")),
                Cell::new(obj.metadata.namespace.as_deref().unwrap_or("-")).fg(self.theme.muted),
                Cell::new(obj.metadata.resource_version.as_deref().unwrap_or(""))
                    .set_alignment(CellAlignment::Right),
                Cell::new(labels),
            ]);
        }

        let mut output = Self::title(kind, objects.len(), "objects");
        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    /// Render the cache warm-up result per kind
    pub fn render_sync_summary(&self, rows: &[SyncSummary]) -> String {
        if rows.is_empty() {
            return "No kinds requested, informers start on first read".to_string();
        }

        let mut table = Self::table();
        table.set_header(vec![
            Cell::new("KIND").set_alignment(CellAlignment::Left),
            Cell::new("STATUS").set_alignment(CellAlignment::Center),
            Cell::new("OBJECTS").set_alignment(CellAlignment::Right),
            Cell::new("DETAIL").set_alignment(CellAlignment::Left),
        ]);

        for row in rows {
            let color = self.theme.sync_color(row.count);
            table.add_row(vec![
                Cell::new(&row.kind),
                Cell::new(format!(
                    "{} {}",
                    StatusIcon::sync_icon(row.count),
                    StatusIcon::sync_text(row.count)
                ))
                .fg(color),
                Cell::new(row.count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()))
                    .set_alignment(CellAlignment::Right),
                Cell::new(&row.detail),
            ]);
        }

        let mut output = Self::title("Cache", rows.len(), "kinds");
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Legend: {} Synced  {} Empty  {} Failed\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::EMPTY.bright_black(),
            StatusIcon::ERROR.red()
        ));
        output
    }
}

fn scope_text(namespaced: bool) -> &'static str {
    if namespaced {
        "Namespaced"
    } else {
        "Cluster"
    }
}
