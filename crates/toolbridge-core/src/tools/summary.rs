//! Read model of the registry contents

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::types::{ToolCategory, ToolDescriptor};

/// Tools of one category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
    pub count: usize,
    pub tools: Vec<String>,
    /// Tool names per connection; empty for local tools
    #[serde(rename = "byConnection", skip_serializing_if = "BTreeMap::is_empty")]
    pub by_connection: BTreeMap<String, Vec<String>>,
}

/// Counts and names of registered tools
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolSummary {
    pub total: usize,
    pub local: CategorySummary,
    pub subprocess: CategorySummary,
    pub network: CategorySummary,
}

impl ToolSummary {
    /// Build from descriptors already in registry order
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a ToolDescriptor>) -> Self {
        let mut summary = ToolSummary::default();
        for descriptor in descriptors {
            summary.total += 1;
            let category = summary.category_mut(descriptor.category);
            category.count += 1;
            category.tools.push(descriptor.name.clone());
            if let Some(connection) = descriptor.source.connection_name() {
                category
                    .by_connection
                    .entry(connection.to_string())
                    .or_default()
                    .push(descriptor.name.clone());
            }
        }
        summary
    }

    pub fn category(&self, category: ToolCategory) -> &CategorySummary {
        match category {
            ToolCategory::Local => &self.local,
            ToolCategory::Subprocess => &self.subprocess,
            ToolCategory::Network => &self.network,
        }
    }

    fn category_mut(&mut self, category: ToolCategory) -> &mut CategorySummary {
        match category {
            ToolCategory::Local => &mut self.local,
            ToolCategory::Subprocess => &mut self.subprocess,
            ToolCategory::Network => &mut self.network,
        }
    }
}

impl fmt::Display for ToolSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} tools available", self.total)?;
        for category in [ToolCategory::Local, ToolCategory::Subprocess, ToolCategory::Network] {
            let summary = self.category(category);
            if summary.count == 0 {
                continue;
            }
            writeln!(f, "  {} ({}):", category, summary.count)?;
            if summary.by_connection.is_empty() {
                writeln!(f, "    {}", summary.tools.join(", "))?;
            } else {
                for (connection, tools) in &summary.by_connection {
                    writeln!(f, "    {}: {}", connection, tools.join(", "))?;
                }
            }
        }
        Ok(())
    }
}
