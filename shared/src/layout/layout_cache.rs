use std::{collections::HashMap, rc::Rc};

use log::debug;

use crate::{
    layout::rep_layout::RepLayout,
    object::class_kinds::{ClassKind, ClassKinds},
};

/// Lazily built layouts, one per class, kept for the lifetime of the owning
/// server or client
#[derive(Default)]
pub struct LayoutCache {
    layouts: HashMap<ClassKind, Rc<RepLayout>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            layouts: HashMap::new(),
        }
    }

    /// Returns the layout for a registered class, building it on first use
    pub fn layout_for(&mut self, class_kind: &ClassKind, class_kinds: &ClassKinds) -> Option<Rc<RepLayout>> {
        if let Some(layout) = self.layouts.get(class_kind) {
            return Some(layout.clone());
        }
        let description = class_kinds.description(class_kind)?;
        let layout = Rc::new(RepLayout::build(&description));
        debug!(
            "built replication layout for {} ({} fields, {} functions)",
            layout.class_name(),
            layout.fields().len(),
            layout.functions().len()
        );
        self.layouts.insert(*class_kind, layout.clone());
        Some(layout)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
