//! Generated artifacts of a compilation unit.

use std::iter::FusedIterator;

use classforge_compiler::GeneratedArtifact;

use crate::module::ModuleContext;

/// Class files of the classes that passed code generation, in registration
/// order.
///
/// The iterator borrows the unit; clone it to walk the artifacts again.
#[derive(Debug, Clone)]
pub struct Artifacts<'a> {
    modules: std::slice::Iter<'a, ModuleContext>,
}

impl<'a> Artifacts<'a> {
    pub(crate) fn new(modules: &'a [ModuleContext]) -> Self {
        Self {
            modules: modules.iter(),
        }
    }

    /// `(qualified name, bytes)` pairs.
    pub fn named_bytes(self) -> impl Iterator<Item = (String, &'a [u8])> + Clone {
        self.map(|a| (a.name.to_string(), a.bytes.as_slice()))
    }
}

impl<'a> Iterator for Artifacts<'a> {
    type Item = &'a GeneratedArtifact;

    fn next(&mut self) -> Option<Self::Item> {
        self.modules.by_ref().find_map(ModuleContext::artifact)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.modules.size_hint().1)
    }
}

impl FusedIterator for Artifacts<'_> {}
