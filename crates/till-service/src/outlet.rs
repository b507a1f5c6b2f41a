//! Outlet lookup collaborator.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::ServiceResult;

/// Answers whether an outlet exists. Backed by whatever system owns outlets.
#[async_trait]
pub trait OutletDirectory: Send + Sync {
    async fn outlet_exists(&self, outlet_id: &str) -> ServiceResult<bool>;
}

/// Outlet list fixed at startup (`TILL_OUTLETS`).
///
/// `permissive()` accepts every outlet, for deployments where the outlet
/// check happens upstream.
#[derive(Debug, Clone, Default)]
pub struct StaticOutletDirectory {
    outlets: Option<HashSet<String>>,
}

impl StaticOutletDirectory {
    pub fn new<I, S>(outlets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticOutletDirectory {
            outlets: Some(outlets.into_iter().map(Into::into).collect()),
        }
    }

    pub fn permissive() -> Self {
        StaticOutletDirectory { outlets: None }
    }
}

#[async_trait]
impl OutletDirectory for StaticOutletDirectory {
    async fn outlet_exists(&self, outlet_id: &str) -> ServiceResult<bool> {
        Ok(match &self.outlets {
            Some(outlets) => outlets.contains(outlet_id),
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticOutletDirectory::new(["outlet-1", "outlet-2"]);
        assert!(directory.outlet_exists("outlet-1").await.unwrap());
        assert!(!directory.outlet_exists("outlet-9").await.unwrap());

        assert!(StaticOutletDirectory::permissive()
            .outlet_exists("anything")
            .await
            .unwrap());
    }
}
