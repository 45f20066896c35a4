//! Lazy container walks

use std::collections::HashSet;

use crate::error::{InventoryError, InventoryResult};
use crate::vim::{ManagedObjectRef, VimSession, kinds, moref_list_property};

/// Depth-first walk over a container's `childEntity` tree
///
/// Yields every child whose remote type equals the requested kind and
/// descends into folders (and storage pods, unless pods are what is
/// requested). Each folder is expanded at most once, so cyclic inventories
/// terminate. A folder that cannot be listed yields one error item and the
/// walk goes on with its siblings.
///
/// The walk is lazy: nothing is read before the first call to `next`.
pub struct EntityWalk<'a> {
    session: &'a dyn VimSession,
    kind: String,
    pending: Option<ManagedObjectRef>,
    stack: Vec<std::vec::IntoIter<ManagedObjectRef>>,
    visited: HashSet<String>,
}

impl<'a> EntityWalk<'a> {
    fn new(session: &'a dyn VimSession, container: &ManagedObjectRef, kind: &str) -> Self {
        Self {
            session,
            kind: kind.to_string(),
            pending: Some(container.clone()),
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    fn descends_into(&self, child: &ManagedObjectRef) -> bool {
        child.is(kinds::FOLDER) || (child.is(kinds::STORAGE_POD) && self.kind != kinds::STORAGE_POD)
    }
}

impl Iterator for EntityWalk<'_> {
    type Item = InventoryResult<ManagedObjectRef>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(container) = self.pending.take() {
                self.visited.insert(container.value.clone());
                match moref_list_property(self.session, &container, "childEntity") {
                    Ok(children) => self.stack.push(children.into_iter()),
                    Err(e) => {
                        tracing::warn!(container = %container, error = %e, "cannot list children");
                        return Some(Err(InventoryError::Remote(e)));
                    }
                }
            }

            let top = self.stack.last_mut()?;
            let Some(child) = top.next() else {
                self.stack.pop();
                continue;
            };

            if child.kind == self.kind {
                return Some(Ok(child));
            }
            if self.descends_into(&child) {
                if self.visited.contains(&child.value) {
                    tracing::warn!(folder = %child, "folder reached twice, not walking it again");
                } else {
                    self.pending = Some(child);
                }
            }
        }
    }
}

/// Walks `container` for objects of remote type `kind`
pub fn discover<'a>(
    session: &'a dyn VimSession,
    container: &ManagedObjectRef,
    kind: &str,
) -> EntityWalk<'a> {
    EntityWalk::new(session, container, kind)
}
