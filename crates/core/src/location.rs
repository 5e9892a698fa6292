use std::sync::{Arc, Mutex, PoisonError};

use crate::query_view::QueryParams;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    pub query: QueryParams,
}

impl Location {
    #[must_use]
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            query: QueryParams::new(),
        }
    }

    #[must_use]
    pub fn to_url(&self) -> String {
        if self.query.is_empty() {
            self.pathname.clone()
        } else {
            format!("{}?{}", self.pathname, self.query.to_query_string())
        }
    }
}

/// The visible location of the current page.
pub trait LocationSink: Send + Sync {
    fn pathname(&self) -> String;

    /// Overwrites the whole query string without a reload.
    fn replace(&self, pathname: &str, query: QueryParams);
}

impl<T: LocationSink + ?Sized> LocationSink for Arc<T> {
    fn pathname(&self) -> String {
        (**self).pathname()
    }

    fn replace(&self, pathname: &str, query: QueryParams) {
        (**self).replace(pathname, query);
    }
}

#[derive(Debug, Default)]
struct LocationState {
    current: Location,
    replacements: usize,
}

/// Shared in-process location slot. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    state: Arc<Mutex<LocationState>>,
}

impl MemoryLocation {
    #[must_use]
    pub fn new(initial: Location) -> Self {
        Self {
            state: Arc::new(Mutex::new(LocationState {
                current: initial,
                replacements: 0,
            })),
        }
    }

    #[must_use]
    pub fn current(&self) -> Location {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    #[must_use]
    pub fn replacements(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replacements
    }
}

impl LocationSink for MemoryLocation {
    fn pathname(&self) -> String {
        self.current().pathname
    }

    fn replace(&self, pathname: &str, query: QueryParams) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.current = Location {
            pathname: pathname.to_string(),
            query,
        };
        state.replacements += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{Location, LocationSink, MemoryLocation};
    use crate::query_view::QueryParams;

    #[test]
    fn replace_overwrites_query_and_counts_writes() {
        let mut initial = Location::new("/organizations/acme/discover/results/");
        initial.query.insert_single("stale", "yes");
        let location = MemoryLocation::new(initial);

        let mut query = QueryParams::new();
        query.insert_single("name", "New");
        location.replace(&location.pathname(), query.clone());

        let current = location.current();
        assert_eq!(current.pathname, "/organizations/acme/discover/results/");
        assert_eq!(current.query, query);
        assert_eq!(location.replacements(), 1);
    }

    #[test]
    fn clones_share_the_same_slot() {
        let location = MemoryLocation::new(Location::new("/results/"));
        let other = location.clone();

        let mut query = QueryParams::new();
        query.insert_single("id", "5");
        other.replace("/results/", query);

        assert_eq!(location.current().to_url(), "/results/?id=5");
    }

    #[test]
    fn url_without_query_is_bare_path() {
        assert_eq!(Location::new("/results/").to_url(), "/results/");
    }
}
