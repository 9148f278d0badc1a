//! The contact directory cache.
//!
//! Owns the decoded contact list, the active filter and sort order, and the
//! materialized view the front end reads from. The view is recomputed in
//! full on every change; personal directories are small enough that this
//! stays cheap.

use std::rc::Rc;

use tracing::debug;

use crate::contact::{Contact, SortOrder};
use crate::directory::DirectorySource;
use crate::error::{DirectoryError, DirectoryResult};
use crate::observers::{
    ObserverId, SelectionListeners, SelectionObserver, SelectionSource, ViewListeners, ViewObserver,
};
use crate::search::SearchMode;

/// Columns shown for one view entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub name: String,
    pub email: String,
    pub chat: String,
}

impl ViewRow {
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            name: contact.full_name().to_string(),
            email: contact.email().to_string(),
            chat: contact.chat().to_string(),
        }
    }
}

pub struct ContactDirectoryCache<S> {
    source: S,
    mode: SearchMode,
    /// Backing list; `None` until the first load.
    everyone: Option<Vec<Rc<Contact>>>,
    current_user: Option<Rc<Contact>>,
    view: Vec<Rc<Contact>>,
    filter: Option<String>,
    sort: SortOrder,
    selection: SelectionListeners,
    view_listeners: ViewListeners,
}

impl<S: DirectorySource> ContactDirectoryCache<S> {
    #[cfg(test)]
    pub fn new(source: S) -> Self {
        Self::with_options(source, SortOrder::default(), SearchMode::default())
    }

    pub fn with_options(source: S, sort: SortOrder, mode: SearchMode) -> Self {
        Self {
            source,
            mode,
            everyone: None,
            current_user: None,
            view: Vec::new(),
            filter: None,
            sort,
            selection: SelectionListeners::default(),
            view_listeners: ViewListeners::default(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.everyone.is_some()
    }

    /// Fetch and decode the directory. Only the first call does any work.
    ///
    /// Nameless contacts are dropped here, once. The current user is looked
    /// up on a best-effort basis and, when found, becomes the selection.
    pub fn load(&mut self) {
        if self.everyone.is_some() {
            return;
        }

        let records = self.source.list_all();
        let fetched = records.len();
        let everyone: Vec<Rc<Contact>> = records
            .into_iter()
            .map(|raw| Contact::with_search_mode(raw, self.mode))
            .filter(|contact| !contact.full_name().is_empty())
            .map(Rc::new)
            .collect();
        debug!(
            fetched,
            kept = everyone.len(),
            skipped = fetched - everyone.len(),
            "loaded directory"
        );

        self.current_user = self.source.current_user_id().and_then(|id| {
            everyone
                .iter()
                .find(|contact| contact.id() == id)
                .cloned()
        });
        self.everyone = Some(everyone);

        self.update_view();

        if let Some(me) = self.current_user.clone() {
            debug!(id = me.id(), "selecting current user");
            self.selection.select(SelectionSource::CurrentUser, Some(me));
        }
    }

    /// Set the substring filter; `None` or empty text clears it.
    pub fn set_filter(&mut self, text: Option<&str>) {
        self.filter = self.mode.normalize_query(text);
        if self.is_loaded() {
            self.update_view();
        } else {
            self.load();
        }
    }

    pub fn set_sort(&mut self, order: SortOrder) {
        self.sort = order;
        if self.is_loaded() {
            self.update_view();
        } else {
            self.load();
        }
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    /// The view as of the last load, filter or sort change.
    pub fn current_view(&self) -> &[Rc<Contact>] {
        &self.view
    }

    pub fn selected_contact(&self, index: usize) -> Option<&Rc<Contact>> {
        self.view.get(index)
    }

    pub fn rows(&self) -> Vec<ViewRow> {
        self.view
            .iter()
            .map(|contact| ViewRow::from_contact(contact))
            .collect()
    }

    /// The loaded contact describing the directory's owner, if any.
    pub fn current_user(&self) -> Option<&Rc<Contact>> {
        self.current_user.as_ref()
    }

    /// Select the view entry at `index`, clearing the selection when out
    /// of range, and notify selection observers.
    pub fn select(&mut self, index: usize) -> Option<Rc<Contact>> {
        let contact = self.view.get(index).cloned();
        self.selection.select(SelectionSource::View, contact.clone());
        contact
    }

    pub fn selection(&self) -> Option<&Rc<Contact>> {
        self.selection.selected()
    }

    pub fn request_edit(&self, contact: Option<&Contact>) -> DirectoryResult<()> {
        let contact = contact
            .ok_or_else(|| DirectoryError::InvalidArgument("cannot edit an absent contact".into()))?;
        let id = contact.id();
        if id.is_empty() {
            return Err(DirectoryError::InvalidArgument(format!(
                "cannot edit `{}`: contact has no id",
                contact.full_name()
            )));
        }
        self.source.edit(id)
    }

    pub fn edit_selected(&self) -> DirectoryResult<()> {
        self.request_edit(self.selection.selected().map(|contact| &**contact))
    }

    pub fn add_selection_observer(&mut self, observer: SelectionObserver) -> ObserverId {
        self.selection.add(observer)
    }

    pub fn remove_selection_observer(&mut self, id: ObserverId) -> bool {
        self.selection.remove(id)
    }

    pub fn add_view_observer(&mut self, observer: ViewObserver) -> ObserverId {
        self.view_listeners.add(observer)
    }

    pub fn remove_view_observer(&mut self, id: ObserverId) -> bool {
        self.view_listeners.remove(id)
    }

    fn update_view(&mut self) {
        let everyone = self.everyone.as_deref().unwrap_or_default();
        let mut view: Vec<Rc<Contact>> = match self.filter.as_deref() {
            Some(filter) => everyone
                .iter()
                .filter(|contact| contact.matches(filter))
                .cloned()
                .collect(),
            None => everyone.to_vec(),
        };

        // Stable: equal names keep directory order.
        let sort = self.sort;
        view.sort_by(|a, b| sort.compare(a, b));

        debug!(
            filter = self.filter.as_deref().unwrap_or(""),
            sort = sort.title(),
            len = view.len(),
            "view updated"
        );
        self.view = view;
        self.view_listeners.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::raw::{RawRecord, RawValue};

    #[derive(Default)]
    struct FakeDirectory {
        records: Vec<RawRecord>,
        me: Option<String>,
        list_calls: Cell<usize>,
        edited: RefCell<Vec<String>>,
    }

    impl FakeDirectory {
        fn with_records(records: Vec<RawRecord>) -> Self {
            Self {
                records,
                ..Self::default()
            }
        }
    }

    impl DirectorySource for FakeDirectory {
        fn list_all(&self) -> Vec<RawRecord> {
            self.list_calls.set(self.list_calls.get() + 1);
            self.records.clone()
        }

        fn current_user_id(&self) -> Option<String> {
            self.me.clone()
        }

        fn edit(&self, id: &str) -> DirectoryResult<()> {
            self.edited.borrow_mut().push(id.to_string());
            Ok(())
        }
    }

    fn record(first: &str, last: &str, uid: &str) -> RawRecord {
        let mut record = RawRecord::new()
            .with("First", RawValue::text(first))
            .with("Last", RawValue::text(last));
        if !uid.is_empty() {
            record.insert("UID", RawValue::text(uid));
        }
        record
    }

    fn names(cache: &ContactDirectoryCache<FakeDirectory>) -> Vec<String> {
        cache
            .current_view()
            .iter()
            .map(|contact| contact.full_name().to_string())
            .collect()
    }

    fn sample() -> ContactDirectoryCache<FakeDirectory> {
        ContactDirectoryCache::new(FakeDirectory::with_records(vec![
            record("Bob", "Ng", "b"),
            record("Ann", "Lee", "a"),
            record("", "", "nameless"),
            record("Cid", "Adams", "c"),
        ]))
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut cache = sample();
        assert!(cache.current_view().is_empty());
        cache.load();
        cache.load();
        assert_eq!(cache.source.list_calls.get(), 1);
        assert_eq!(names(&cache), vec!["Ann Lee", "Bob Ng", "Cid Adams"]);
    }

    #[test]
    fn test_nameless_contacts_never_in_view() {
        let mut cache = sample();
        cache.set_filter(None);
        assert_eq!(cache.current_view().len(), 3);
        assert!(cache.current_view().iter().all(|c| c.id() != "nameless"));
        cache.set_sort(SortOrder::Last);
        assert!(cache.current_view().iter().all(|c| !c.full_name().is_empty()));
    }

    #[test]
    fn test_filter_matches_substring() {
        let mut cache = ContactDirectoryCache::new(FakeDirectory::with_records(vec![
            record("Ann", "Lee", "a"),
            record("Bob", "Ng", "b"),
        ]));
        cache.set_filter(Some("an"));
        assert_eq!(names(&cache), vec!["Ann Lee"]);
        assert_eq!(cache.filter(), Some("an"));
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let mut cache = sample();
        cache.set_filter(Some("LEE"));
        assert_eq!(names(&cache), vec!["Ann Lee"]);
    }

    #[test]
    fn test_filter_matches_email_and_chat() {
        let mut cache = ContactDirectoryCache::new(FakeDirectory::with_records(vec![
            record("Ann", "Lee", "a").with("Email", RawValue::text("ann@example.com")),
            record("Bob", "Ng", "b").with("AIMInstant", RawValue::text("bobchat")),
        ]));
        cache.set_filter(Some("example"));
        assert_eq!(names(&cache), vec!["Ann Lee"]);
        cache.set_filter(Some("chat"));
        assert_eq!(names(&cache), vec!["Bob Ng"]);
    }

    #[test]
    fn test_clearing_filter_restores_list() {
        let mut cache = sample();
        cache.set_filter(Some("bob"));
        assert_eq!(cache.current_view().len(), 1);
        cache.set_filter(None);
        assert_eq!(cache.current_view().len(), 3);
        cache.set_filter(Some("bob"));
        cache.set_filter(Some(""));
        assert_eq!(cache.current_view().len(), 3);
        assert_eq!(cache.filter(), None);
    }

    #[test]
    fn test_sort_changes_order_not_membership() {
        let mut cache = sample();
        cache.set_sort(SortOrder::Last);
        let by_last = names(&cache);
        assert_eq!(by_last, vec!["Cid Adams", "Ann Lee", "Bob Ng"]);
        cache.set_sort(SortOrder::First);
        let by_first = names(&cache);
        assert_eq!(by_first, vec!["Ann Lee", "Bob Ng", "Cid Adams"]);

        let mut a = by_last.clone();
        let mut b = by_first.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
        assert_eq!(cache.sort_order(), SortOrder::First);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut cache = ContactDirectoryCache::new(FakeDirectory::with_records(vec![
            record("Ann", "Zed", "1"),
            record("Ann", "Lee", "2"),
            record("Ann", "Moe", "3"),
        ]));
        cache.set_sort(SortOrder::First);
        let ids: Vec<&str> = cache.current_view().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_sort_is_case_sensitive() {
        let mut cache = ContactDirectoryCache::new(FakeDirectory::with_records(vec![
            record("alice", "", "1"),
            record("Bob", "", "2"),
        ]));
        cache.set_sort(SortOrder::First);
        assert_eq!(names(&cache), vec!["Bob", "alice"]);
    }

    #[test]
    fn test_selected_contact_out_of_range() {
        let mut cache = sample();
        cache.load();
        assert!(cache.selected_contact(0).is_some());
        assert!(cache.selected_contact(2).is_some());
        assert!(cache.selected_contact(3).is_none());
        assert!(cache.selected_contact(usize::MAX).is_none());
    }

    #[test]
    fn test_current_view_does_not_recompute() {
        let mut cache = sample();
        let notified = Rc::new(Cell::new(0));
        let counter = Rc::clone(&notified);
        cache.add_view_observer(Box::new(move || counter.set(counter.get() + 1)));
        cache.load();
        assert_eq!(notified.get(), 1);
        let _ = cache.current_view();
        let _ = cache.rows();
        cache.load();
        assert_eq!(notified.get(), 1);
        cache.set_filter(Some("a"));
        cache.set_sort(SortOrder::Last);
        assert_eq!(notified.get(), 3);
    }

    #[test]
    fn test_first_set_filter_loads_lazily() {
        let mut cache = sample();
        let notified = Rc::new(Cell::new(0));
        let counter = Rc::clone(&notified);
        cache.add_view_observer(Box::new(move || counter.set(counter.get() + 1)));
        cache.set_filter(Some("ann"));
        assert!(cache.is_loaded());
        assert_eq!(names(&cache), vec!["Ann Lee"]);
        assert_eq!(notified.get(), 1);
    }

    #[test]
    fn test_request_edit_delegates_id() {
        let mut cache = sample();
        cache.load();
        let contact = Rc::clone(cache.selected_contact(0).unwrap());
        cache.request_edit(Some(&contact)).unwrap();
        assert_eq!(*cache.source.edited.borrow(), vec!["a".to_string()]);
    }

    #[test]
    fn test_request_edit_rejects_missing_contact_or_id() {
        let cache = sample();
        assert!(matches!(
            cache.request_edit(None),
            Err(DirectoryError::InvalidArgument(_))
        ));
        let anonymous = Contact::new(record("Ann", "Lee", ""));
        assert!(matches!(
            cache.request_edit(Some(&anonymous)),
            Err(DirectoryError::InvalidArgument(_))
        ));
        assert!(cache.source.edited.borrow().is_empty());
    }

    #[test]
    fn test_current_user_selected_on_load() {
        let mut directory = FakeDirectory::with_records(vec![
            record("Ann", "Lee", "a"),
            record("Bob", "Ng", "b"),
        ]);
        directory.me = Some("b".into());
        let mut cache = ContactDirectoryCache::new(directory);

        let seen: Rc<RefCell<Vec<(SelectionSource, Option<String>)>>> = Rc::default();
        let log = Rc::clone(&seen);
        cache.add_selection_observer(Box::new(
            move |source: SelectionSource, contact: Option<&Rc<Contact>>| {
                log.borrow_mut()
                    .push((source, contact.map(|c| c.id().to_string())));
            },
        ));
        cache.load();

        assert_eq!(cache.current_user().map(|c| c.id()), Some("b"));
        assert_eq!(
            *seen.borrow(),
            vec![
                (SelectionSource::Initial, None),
                (SelectionSource::CurrentUser, Some("b".to_string())),
            ]
        );
        cache.edit_selected().unwrap();
        assert_eq!(*cache.source.edited.borrow(), vec!["b".to_string()]);
    }

    #[test]
    fn test_unknown_current_user_is_silent() {
        let mut directory = FakeDirectory::with_records(vec![record("Ann", "Lee", "a")]);
        directory.me = Some("nobody".into());
        let mut cache = ContactDirectoryCache::new(directory);
        cache.load();
        assert!(cache.current_user().is_none());
        assert!(cache.selection().is_none());
        assert_eq!(cache.current_view().len(), 1);
    }

    #[test]
    fn test_select_notifies_and_edit_selected() {
        let mut cache = sample();
        cache.set_sort(SortOrder::Last);
        let selected = cache.select(0).unwrap();
        assert_eq!(selected.id(), "c");
        assert_eq!(cache.selection().map(|c| c.id()), Some("c"));
        cache.edit_selected().unwrap();

        assert!(cache.select(10).is_none());
        assert!(cache.selection().is_none());
        assert!(matches!(
            cache.edit_selected(),
            Err(DirectoryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_removed_selection_observer_not_notified() {
        let mut cache = sample();
        cache.load();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let id = cache.add_selection_observer(Box::new(
            move |_: SelectionSource, _: Option<&Rc<Contact>>| counter.set(counter.get() + 1),
        ));
        assert_eq!(calls.get(), 1);
        assert!(cache.remove_selection_observer(id));
        assert!(!cache.remove_selection_observer(id));
        cache.select(0);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.selection().map(|c| c.id()), Some("a"));
    }

    #[test]
    fn test_removed_view_observer() {
        let mut cache = sample();
        let notified = Rc::new(Cell::new(0));
        let counter = Rc::clone(&notified);
        let id = cache.add_view_observer(Box::new(move || counter.set(counter.get() + 1)));
        assert!(cache.remove_view_observer(id));
        cache.load();
        assert_eq!(notified.get(), 0);
    }

    #[test]
    fn test_empty_directory() {
        let mut cache = ContactDirectoryCache::new(FakeDirectory::default());
        cache.set_filter(Some("ann"));
        assert!(cache.is_loaded());
        assert!(cache.current_view().is_empty());
        assert!(cache.select(0).is_none());
    }

    #[test]
    fn test_rows_projection() {
        let mut cache = ContactDirectoryCache::new(FakeDirectory::with_records(vec![record(
            "Ann", "Lee", "a",
        )
        .with("Email", RawValue::text("ann@example.com"))]));
        cache.load();
        assert_eq!(
            cache.rows(),
            vec![ViewRow {
                name: "Ann Lee".into(),
                email: "ann@example.com".into(),
                chat: String::new(),
            }]
        );
    }
}
