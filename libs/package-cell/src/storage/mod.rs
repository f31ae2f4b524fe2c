//! Storage abstraction for session packages.

mod memory;
mod supabase;

pub use memory::InMemoryPackageStore;
pub use supabase::SupabasePackageStore;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Package;

#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn get_package(&self, package_id: Uuid, auth_token: &str) -> Result<Option<Package>>;

    async fn insert_package(&self, package: &Package, auth_token: &str) -> Result<Package>;

    async fn packages_for_child(&self, child_id: Uuid, auth_token: &str) -> Result<Vec<Package>>;

    /// Sets `used_sessions` to `new_used` only if it still equals `expected_used`.
    /// Returns the updated package, or `None` when another writer got there first
    /// (or the package no longer exists).
    async fn compare_and_set_used(
        &self,
        package_id: Uuid,
        expected_used: i32,
        new_used: i32,
        auth_token: &str,
    ) -> Result<Option<Package>>;
}
