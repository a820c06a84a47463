//! Delivery of JSON payloads to the collection server
//!
//! The pipeline only needs "send this payload to that endpoint, tell me if it
//! worked". [`Transport`] is that contract; [`HttpTransport`] is the reqwest
//! binding used in production.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Category;

/// Logical endpoint on the collection server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Events,
    EventBatch,
    Sessions,
    Errors,
    Network,
    Performance,
    Interactions,
    ScreenViews,
}

impl Endpoint {
    /// Endpoint for a single record of the given category
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Event => Endpoint::Events,
            Category::Session => Endpoint::Sessions,
            Category::Error => Endpoint::Errors,
            Category::Network => Endpoint::Network,
            Category::Performance => Endpoint::Performance,
            Category::Interaction => Endpoint::Interactions,
            Category::ScreenView => Endpoint::ScreenViews,
        }
    }

    /// Endpoint for several records of the given category sent together,
    /// or None when the backend only accepts them one at a time
    pub fn batch_for(category: Category) -> Option<Self> {
        match category {
            Category::Event => Some(Endpoint::EventBatch),
            _ => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Events => "/events",
            Endpoint::EventBatch => "/events/batch",
            Endpoint::Sessions => "/sessions",
            Endpoint::Errors => "/errors",
            Endpoint::Network => "/network",
            Endpoint::Performance => "/performance",
            Endpoint::Interactions => "/interactions",
            Endpoint::ScreenViews => "/screenviews",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Sends one JSON payload per call
///
/// Any `Err` is treated by the pipeline as a transient failure and the
/// payload's records are requeued.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: Endpoint, payload: &serde_json::Value) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_events_batch() {
        assert_eq!(Endpoint::batch_for(Category::Event), Some(Endpoint::EventBatch));
        for category in Category::ALL {
            if category != Category::Event {
                assert_eq!(Endpoint::batch_for(category), None);
            }
        }
    }

    #[test]
    fn test_each_category_has_distinct_endpoint() {
        let mut paths: Vec<_> = Category::ALL
            .iter()
            .map(|c| Endpoint::for_category(*c).path())
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), Category::ALL.len());
    }
}
