//! Exporter-defined record layouts, shared by every datagram handled in a
//! collector process.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;


pub type TemplateId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateField {
    pub field_type: u16,
    pub length: u16,
}

impl TemplateField {
    pub fn new(field_type: u16, length: u16) -> Self {
        Self { field_type, length }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: TemplateId,
    pub fields: Vec<TemplateField>,
}

impl Template {
    pub fn new(id: TemplateId, fields: Vec<TemplateField>) -> Self {
        Self { id, fields }
    }

    pub fn record_length(&self) -> usize {
        self.fields.iter().map(|field| field.length as usize).sum()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub redefined: usize,
}

/// Cheap to clone; clones share the same underlying map.
#[derive(Debug, Default, Clone)]
pub struct TemplateCache {
    templates: Arc<RwLock<HashMap<TemplateId, Arc<Template>>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(templates: impl IntoIterator<Item = Template>) -> Self {
        let cache = Self::new();
        cache.merge(templates);
        cache
    }

    pub fn get(&self, id: TemplateId) -> Option<Arc<Template>> {
        self.templates.read().get(&id).cloned()
    }

    /// Later definitions of an id replace earlier ones. The whole batch is
    /// applied under one write lock so lookups never see half of it.
    pub fn merge(&self, templates: impl IntoIterator<Item = Template>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut map = self.templates.write();
        for template in templates {
            match map.insert(template.id, Arc::new(template.clone())) {
                Some(previous) if *previous != template => outcome.redefined += 1,
                Some(_) => {}
                None => outcome.added += 1,
            }
        }
        outcome
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    pub fn ids(&self) -> Vec<TemplateId> {
        let mut ids: Vec<TemplateId> = self.templates.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
