//! Classification of log records into display buffers.

use scriptdeck_types::{BufferId, LogRecord, SYSTEM_SOURCE, ScriptCatalog};

/// Maps each record's source to exactly one buffer.
///
/// Total: a source that is neither the system sentinel nor a known display
/// name falls back to the system buffer.
#[derive(Debug, Clone)]
pub struct LogRouter {
    catalog: ScriptCatalog,
}

impl LogRouter {
    #[must_use]
    pub fn new(catalog: ScriptCatalog) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &ScriptCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn route(&self, record: &LogRecord) -> BufferId {
        self.route_source(record.source())
    }

    #[must_use]
    pub fn route_source(&self, source: &str) -> BufferId {
        if source == SYSTEM_SOURCE {
            return BufferId::System;
        }
        match self.catalog.id_for_display_name(source) {
            Some(id) => BufferId::Script(id.clone()),
            None => {
                tracing::trace!(source, "Unknown log source, routing to system");
                BufferId::System
            }
        }
    }
}
