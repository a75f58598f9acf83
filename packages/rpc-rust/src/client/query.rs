//! Query string builder for REST client calls.

use svcwire_core::{FilterParams, IdGenerator, PagingParams};

use crate::network::CORRELATION_ID;

/// Query parameters of one call: correlation id, filter and paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestQueryParams {
    pairs: Vec<(String, String)>,
}

impl RestQueryParams {
    /// Starts with `correlation_id`, generating a short id when absent.
    #[must_use]
    pub fn new(correlation_id: Option<&str>) -> Self {
        let correlation_id = correlation_id.map_or_else(IdGenerator::next_short, str::to_string);
        Self {
            pairs: vec![(CORRELATION_ID.to_string(), correlation_id)],
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    #[must_use]
    pub fn with_filter(self, filter: Option<&FilterParams>) -> Self {
        filter
            .into_iter()
            .flat_map(|f| f.iter())
            .fold(self, |params, (k, v)| params.with(k.clone(), v.clone()))
    }

    /// Adds `skip` and `take` when set, and `total` when requested.
    #[must_use]
    pub fn with_paging(mut self, paging: Option<&PagingParams>) -> Self {
        let Some(paging) = paging else {
            return self;
        };
        if let Some(skip) = paging.skip {
            self = self.with("skip", skip.to_string());
        }
        if let Some(take) = paging.take {
            self = self.with("take", take.to_string());
        }
        if paging.total {
            self = self.with("total", "true");
        }
        self
    }

    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.pairs[0].1
    }

    #[must_use]
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}
