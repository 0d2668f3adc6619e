//! Synthetic operation payloads.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use surge_core::{default_templates, Record, RecordKey, RecordTemplate};

use crate::registry::KeyRegistry;

/// Produces records for writes and picks keys for reads.
#[derive(Debug, Clone)]
pub struct OperationGenerator {
    templates: Arc<[RecordTemplate]>,
    registry: KeyRegistry,
}

impl OperationGenerator {
    /// Creates a generator over `templates`, falling back to the built-in
    /// pool when `templates` is empty.
    #[must_use]
    pub fn new(templates: Vec<RecordTemplate>, registry: KeyRegistry) -> Self {
        let templates = if templates.is_empty() {
            default_templates()
        } else {
            templates
        };
        Self {
            templates: templates.into(),
            registry,
        }
    }

    /// Returns the template pool in use.
    #[must_use]
    pub fn templates(&self) -> &[RecordTemplate] {
        &self.templates
    }

    /// Returns the key registry reads sample from.
    #[must_use]
    pub const fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Generates a record with a fresh key from a uniformly chosen template.
    ///
    /// The value is drawn uniformly from the template's inclusive range; an
    /// inverted range yields `min_value`.
    pub fn generate_write<R: Rng + ?Sized>(&self, rng: &mut R) -> Record {
        let template = &self.templates[rng.gen_range(0..self.templates.len())];
        let value = if template.min_value < template.max_value {
            rng.gen_range(template.min_value..=template.max_value)
        } else {
            template.min_value
        };

        let timestamp = Utc::now();
        let millis = u64::try_from(timestamp.timestamp_millis()).unwrap_or(0);
        Record {
            id: RecordKey::generate(millis, rng),
            category: template.category.clone(),
            data: template.name.clone(),
            timestamp,
            value,
        }
    }

    /// Returns a previously written key, or `None` if nothing was written yet.
    pub fn pick_read_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<RecordKey> {
        self.registry.sample(rng)
    }
}
