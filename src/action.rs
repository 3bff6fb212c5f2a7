/// A clonable, zero-argument callback.
///
/// Registration always stores a clone produced by [`Action::clone_action`],
/// never the caller's value, so the caller may pass a transient action and
/// the reactor keeps a long-lived copy of its own.
pub trait Action {
    fn perform(&mut self);

    fn clone_action(&self) -> Box<dyn Action>;
}

impl<F> Action for F
where
    F: FnMut() + Clone + 'static,
{
    fn perform(&mut self) {
        (*self)()
    }

    fn clone_action(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Stable handle to an action owned by an [`ActionRegistry`].
///
/// The descriptor table and timer queue hold these instead of owning copies;
/// a handle left dangling by removal simply stops resolving.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(usize);

enum Slot {
    Vacant,
    // The box is absent while the action is out being performed.
    Occupied(Option<Box<dyn Action>>),
}

/// Owning store for heap-allocated action clones.
///
/// Every clone produced by [`reproduce`](ActionRegistry::reproduce) stays in
/// the registry until it is removed or the registry is dropped, and is
/// released exactly once. Removal is idempotent.
#[derive(Default)]
pub struct ActionRegistry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clones `action` into the registry and returns its handle.
    pub fn reproduce(&mut self, action: &dyn Action) -> ActionId {
        let owned = action.clone_action();
        self.live += 1;

        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Slot::Occupied(Some(owned));
                ActionId(index)
            }
            None => {
                self.slots.push(Slot::Occupied(Some(owned)));
                ActionId(self.slots.len() - 1)
            }
        }
    }

    /// Releases the action behind `id`. A no-op if it was already removed.
    pub fn remove(&mut self, id: ActionId) {
        if let Some(slot @ Slot::Occupied(_)) = self.slots.get_mut(id.0) {
            *slot = Slot::Vacant;
            self.free.push(id.0);
            self.live -= 1;
        }
    }

    /// Number of live owned actions, including any currently out being
    /// performed.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Takes the action out of its slot for invocation. The slot stays
    /// reserved so the firing action can mutate the registry, including
    /// removing its own handle.
    pub(crate) fn take(&mut self, id: ActionId) -> Option<Box<dyn Action>> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Occupied(slot)) => slot.take(),
            _ => None,
        }
    }

    /// Puts a taken action back, unless the slot was removed or reused while
    /// the action was out, in which case the stale box is dropped here.
    pub(crate) fn restore(&mut self, id: ActionId, action: Box<dyn Action>) {
        if let Some(Slot::Occupied(slot)) = self.slots.get_mut(id.0) {
            if slot.is_none() {
                *slot = Some(action);
            }
        }
    }
}
