//! Observer lists for selection and view changes.
//!
//! Both lists notify synchronously, in registration order. The selection
//! list also remembers the last selection and replays it to every newly
//! registered observer.

use std::rc::Rc;

use crate::contact::Contact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Who made the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Nothing has been selected yet
    Initial,
    /// The directory's own card, picked at load time
    CurrentUser,
    /// An entry picked from the view
    View,
}

pub type SelectionObserver = Box<dyn FnMut(SelectionSource, Option<&Rc<Contact>>)>;
pub type ViewObserver = Box<dyn FnMut()>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(ObserverId, T)>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    fn add(&mut self, observer: T) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }
}

pub struct SelectionListeners {
    registry: Registry<SelectionObserver>,
    source: SelectionSource,
    selected: Option<Rc<Contact>>,
}

impl Default for SelectionListeners {
    fn default() -> Self {
        Self {
            registry: Registry::default(),
            source: SelectionSource::Initial,
            selected: None,
        }
    }
}

impl SelectionListeners {
    /// Register an observer and replay the current selection to it.
    pub fn add(&mut self, mut observer: SelectionObserver) -> ObserverId {
        observer(self.source, self.selected.as_ref());
        self.registry.add(observer)
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        self.registry.remove(id)
    }

    pub fn select(&mut self, source: SelectionSource, contact: Option<Rc<Contact>>) {
        self.source = source;
        self.selected = contact;
        for (_, observer) in self.registry.entries.iter_mut() {
            observer(source, self.selected.as_ref());
        }
    }

    pub fn selected(&self) -> Option<&Rc<Contact>> {
        self.selected.as_ref()
    }
}

#[derive(Default)]
pub struct ViewListeners {
    registry: Registry<ViewObserver>,
}

impl ViewListeners {
    pub fn add(&mut self, observer: ViewObserver) -> ObserverId {
        self.registry.add(observer)
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        self.registry.remove(id)
    }

    pub fn notify(&mut self) {
        for (_, observer) in self.registry.entries.iter_mut() {
            observer();
        }
    }
}
