//! Promotion and rendering.
//!
//! A slot is promoted when it closes a cycle, or when it is a named type used
//! more than once and sharing is enabled. Promoted slots are emitted once
//! into the component table and referenced everywhere else; the rest are
//! inlined.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{ReferenceTable, Schema, SchemaRef};

use super::Diagnostic;
use super::pass::{Body, Memo, Pass, Slot, SlotId};

/// Component keys allow `[A-Za-z0-9._-]` only.
static UNSAFE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid component-name regex"));

/// Stable component names, kept across passes of one generator.
#[derive(Debug, Default)]
pub(crate) struct ComponentNames {
    assigned: HashMap<Memo, String>,
    taken: HashSet<String>,
}

impl ComponentNames {
    pub(crate) fn assign(&mut self, memo: Memo, type_name: &str) -> String {
        if let Some(name) = self.assigned.get(&memo) {
            return name.clone();
        }
        let sanitized = UNSAFE_NAME.replace_all(type_name, "_");
        let base = match sanitized.trim_matches('_') {
            "" => "Schema",
            trimmed => trimmed,
        };
        let mut name = base.to_owned();
        let mut n = 2;
        while self.taken.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        self.taken.insert(name.clone());
        self.assigned.insert(memo, name.clone());
        name
    }
}

pub(crate) struct Output {
    pub(crate) schema: Arc<Schema>,
    pub(crate) components: ReferenceTable,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl Pass<'_> {
    pub(crate) fn finish(self, root: SlotId, names: &mut ComponentNames) -> Output {
        let promote_shared = self.options.promote_shared;
        let promoted = self.slots
            .iter()
            .map(|s| s.cycle || (promote_shared && s.memoized && s.uses > 1))
            .collect();

        let mut renderer = Renderer {
            slots: &self.slots,
            promoted,
            prefix: &self.options.ref_prefix,
            names,
            values: HashMap::new(),
            emitted: HashSet::new(),
            components: ReferenceTable::new(),
        };
        // the root is always inline, and also a component when it closes a cycle
        if renderer.promoted[root] {
            renderer.component(root);
        }
        let schema = renderer.value(root);

        Output {
            schema,
            components: renderer.components,
            diagnostics: self.diagnostics,
        }
    }
}

struct Renderer<'p, 'n> {
    slots: &'p [Slot],
    promoted: Vec<bool>,
    prefix: &'p str,
    names: &'n mut ComponentNames,
    values: HashMap<SlotId, Arc<Schema>>,
    emitted: HashSet<SlotId>,
    components: ReferenceTable,
}

impl Renderer<'_, '_> {
    fn reference(&mut self, slot: SlotId) -> SchemaRef {
        let slots = self.slots;
        match &slots[slot].body {
            Body::Link(target) => {
                let name = self.component(*target);
                SchemaRef::Ref(format!("{}{name}", self.prefix))
            }
            _ if self.promoted[slot] => {
                let name = self.component(slot);
                SchemaRef::Ref(format!("{}{name}", self.prefix))
            }
            _ => SchemaRef::Value(self.value(slot)),
        }
    }

    fn value(&mut self, slot: SlotId) -> Arc<Schema> {
        if let Some(value) = self.values.get(&slot) {
            return Arc::clone(value);
        }
        let slots = self.slots;
        let value = match &slots[slot].body {
            Body::Schema(draft) => {
                let draft = draft.clone();
                Arc::new(draft.map_refs(|child| self.reference(*child)))
            }
            Body::Link(target) => return self.value(*target),
            Body::Pending => Arc::new(Schema::default()),
        };
        self.values.insert(slot, Arc::clone(&value));
        value
    }

    fn component(&mut self, slot: SlotId) -> String {
        let slots = self.slots;
        let s = &slots[slot];
        let name = self.names.assign(s.memo, &s.name);
        if self.emitted.insert(slot) {
            tracing::debug!(component = %name, uses = s.uses, cycle = s.cycle, "promoted schema");
            let value = self.value(slot);
            self.components.insert(name.clone(), value);
        }
        name
    }
}
