//! Server-driven paging over `@odata.nextLink`.

use std::collections::HashSet;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use url::Url;

use crate::client::ODataClient;
use crate::error::ApiError;
use crate::transport::Transport;
use crate::types::ODataResponse;

/// Iterator returned by `ODataClient::pages`.
///
/// Yields one envelope per page. Iteration ends after a page without a
/// next link, after the first error, or when a next link points at a page
/// already fetched.
pub struct Pages<'a, T, V> {
    client: &'a ODataClient<T>,
    next: Option<String>,
    visited: HashSet<String>,
    _value: PhantomData<fn() -> V>,
}

impl<'a, T: Transport, V: DeserializeOwned> Pages<'a, T, V> {
    pub(crate) fn new(client: &'a ODataClient<T>, url: &str) -> Self {
        Self {
            client,
            next: Some(url.to_string()),
            visited: HashSet::new(),
            _value: PhantomData,
        }
    }
}

impl<T: Transport, V: DeserializeOwned> Iterator for Pages<'_, T, V> {
    type Item = Result<ODataResponse<V>, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        let url = self.next.take()?;
        self.visited.insert(url.clone());
        let page = match self.client.get_json::<V>(&url) {
            Ok(page) => page,
            Err(err) => return Some(Err(err)),
        };
        self.next = page
            .next_link
            .as_deref()
            .map(|link| resolve(&url, link))
            .filter(|next| !self.visited.contains(next));
        Some(Ok(page))
    }
}

/// Resolve a possibly relative next link against the URL of the page
/// that returned it.
fn resolve(current: &str, link: &str) -> String {
    match Url::parse(current).and_then(|base| base.join(link)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => link.to_string(),
    }
}
