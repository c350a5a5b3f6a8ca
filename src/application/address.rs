//! The address representation as a single observable source of truth.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::application::params::{RawParams, default_for};

/// Current query parameters of the navigation context.
///
/// Readers subscribe for changes; writers go through `set_param` or
/// `navigate`. Clones share the same address.
#[derive(Clone)]
pub struct AddressBar {
    tx: Arc<watch::Sender<RawParams>>,
}

impl AddressBar {
    pub fn new(initial: RawParams) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn from_query(query: &str) -> Self {
        Self::new(RawParams::from_query(query))
    }

    pub fn current(&self) -> RawParams {
        self.tx.borrow().clone()
    }

    /// Receiver with the current address already marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<RawParams> {
        self.tx.subscribe()
    }

    /// Set one parameter. A value equal to the parameter's default removes the
    /// key so the address stays minimal.
    pub fn set_param(&self, key: &str, value: &str) {
        let clears = default_for(key).is_some_and(|default| default == value);
        self.tx.send_if_modified(|raw| {
            let before = raw.clone();
            if clears {
                raw.remove(key);
            } else {
                raw.set(key, value);
            }
            *raw != before
        });
        debug!(key, value, cleared = clears, "address parameter updated");
    }

    /// Replace the whole address, e.g. on a link click.
    pub fn navigate(&self, raw: RawParams) {
        self.tx.send_if_modified(|current| {
            if *current == raw {
                return false;
            }
            *current = raw;
            true
        });
    }

    pub fn to_query_string(&self) -> String {
        self.tx.borrow().to_query_string()
    }
}

impl Default for AddressBar {
    fn default() -> Self {
        Self::new(RawParams::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::params::{PAGE_PARAM, QUERY_PARAM};

    #[test]
    fn set_param_updates_and_clears_on_default() {
        let address = AddressBar::from_query("page=2");

        address.set_param(QUERY_PARAM, "lamp");
        assert_eq!(address.to_query_string(), "page=2&q=lamp");

        address.set_param(QUERY_PARAM, "");
        address.set_param(PAGE_PARAM, "1");
        assert!(address.current().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_changes_but_not_no_ops() {
        let address = AddressBar::default();
        let mut rx = address.subscribe();

        address.set_param(QUERY_PARAM, "");
        assert!(!rx.has_changed().expect("sender alive"));

        address.set_param(QUERY_PARAM, "desk");
        rx.changed().await.expect("sender alive");
        assert_eq!(rx.borrow_and_update().first(QUERY_PARAM), Some("desk"));
    }

    #[test]
    fn clones_share_one_address() {
        let address = AddressBar::default();
        let other = address.clone();

        other.navigate(RawParams::from_query("q=chair&page=3"));
        assert_eq!(address.current().first(PAGE_PARAM), Some("3"));
    }
}
