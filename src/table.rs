//! Mapping from FXY code to descriptor.
//!
//! Replication descriptors (`F == 1`) are never stored; they are synthesised
//! on lookup straight from the code's embedded `X`/`Y` fields, since they are
//! fully self-describing. Sequence descriptors (`F == 3`) are registered as
//! raw child-code lists and resolved once, lazily, into an owned DAG of
//! shared [`Descriptor`]s. BUFR sequences are acyclic by construction, and a
//! cycle is reported as an error rather than looped over forever.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::descriptor::{Descriptor, ElementDescriptor, OperatorDescriptor, ReplicationDescriptor, SequenceDescriptor};
use crate::fxy::Fxy;
use crate::result::{Error, Result};

#[derive(Debug, Default)]
pub struct DescriptorTable {
    elements: HashMap<u16, Rc<Descriptor>>,
    sequences: HashMap<u16, Vec<Fxy>>,
    resolved: RefCell<HashMap<u16, Rc<Descriptor>>>,
}

enum Mark {
    InProgress,
    Done(Rc<Descriptor>),
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_element(&mut self, element: ElementDescriptor) {
        let code = element.code().code();
        self.elements.insert(code, Rc::new(Descriptor::Element(element)));
    }

    pub fn insert_operator(&mut self, operator: OperatorDescriptor) {
        let code = operator.code().code();
        self.elements.insert(code, Rc::new(Descriptor::Operator(operator)));
    }

    /// Registers a D-table sequence as a raw list of child FXY codes. May be
    /// called before the children themselves are registered.
    pub fn define_sequence(&mut self, code: Fxy, children: Vec<Fxy>) {
        self.sequences.insert(code.code(), children);
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.sequences.is_empty()
    }

    /// Looks up `code`. `F == 1` codes are synthesised without touching the
    /// backing maps; sequences are resolved (and memoised) on first access.
    pub fn get(&self, code: Fxy) -> Result<Rc<Descriptor>> {
        if code.f() == 1 {
            return Ok(Rc::new(Descriptor::Replication(ReplicationDescriptor::new(
                code,
                code.x(),
                code.y(),
            ))));
        }
        if let Some(d) = self.elements.get(&code.code()) {
            return Ok(d.clone());
        }
        if self.sequences.contains_key(&code.code()) {
            let mut visiting = HashMap::new();
            return self.resolve_sequence(code, &mut visiting);
        }
        Err(Error::UnknownDescriptor(code.to_fxy_string()))
    }

    fn resolve_sequence(&self, code: Fxy, visiting: &mut HashMap<u16, ()>) -> Result<Rc<Descriptor>> {
        if let Some(cached) = self.resolved.borrow().get(&code.code()) {
            return Ok(cached.clone());
        }
        if visiting.contains_key(&code.code()) {
            return Err(Error::CyclicDescriptorGraph(code.to_fxy_string()));
        }
        visiting.insert(code.code(), ());

        let child_codes = self
            .sequences
            .get(&code.code())
            .ok_or_else(|| Error::UnknownDescriptor(code.to_fxy_string()))?
            .clone();

        let mut children = Vec::with_capacity(child_codes.len());
        for child_code in child_codes {
            let resolved = if child_code.f() == 3 {
                self.resolve_sequence(child_code, visiting)?
            } else {
                self.get(child_code)?
            };
            children.push(resolved);
        }

        let descriptor = Rc::new(Descriptor::Sequence(SequenceDescriptor::new(code, children)));
        self.resolved.borrow_mut().insert(code.code(), descriptor.clone());
        debug!("resolved sequence {} ({} children)", code, descriptor_child_count(&descriptor));
        Ok(descriptor)
    }

    /// Resolves a list of FXY codes (as they appear in section 3) into owned
    /// descriptors.
    pub fn resolve(&self, codes: &[Fxy]) -> Result<Vec<Rc<Descriptor>>> {
        codes.iter().map(|&c| self.get(c)).collect()
    }
}

fn descriptor_child_count(d: &Descriptor) -> usize {
    match d {
        Descriptor::Sequence(s) => s.children().len(),
        _ => 0,
    }
}
