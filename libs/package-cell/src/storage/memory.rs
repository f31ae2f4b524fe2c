use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Package;
use super::PackageStore;

#[derive(Default)]
pub struct InMemoryPackageStore {
    packages: RwLock<HashMap<Uuid, Package>>,
}

impl InMemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageStore for InMemoryPackageStore {
    async fn get_package(&self, package_id: Uuid, _auth_token: &str) -> Result<Option<Package>> {
        Ok(self.packages.read().await.get(&package_id).cloned())
    }

    async fn insert_package(&self, package: &Package, _auth_token: &str) -> Result<Package> {
        self.packages.write().await.insert(package.id, package.clone());
        Ok(package.clone())
    }

    async fn packages_for_child(&self, child_id: Uuid, _auth_token: &str) -> Result<Vec<Package>> {
        let mut found: Vec<Package> = self
            .packages
            .read()
            .await
            .values()
            .filter(|p| p.child_id == child_id)
            .cloned()
            .collect();
        found.sort_by_key(|p| (p.valid_until, p.created_at));
        Ok(found)
    }

    async fn compare_and_set_used(
        &self,
        package_id: Uuid,
        expected_used: i32,
        new_used: i32,
        _auth_token: &str,
    ) -> Result<Option<Package>> {
        let mut packages = self.packages.write().await;
        match packages.get_mut(&package_id) {
            Some(package) if package.used_sessions == expected_used => {
                package.used_sessions = new_used;
                Ok(Some(package.clone()))
            }
            _ => Ok(None),
        }
    }
}
