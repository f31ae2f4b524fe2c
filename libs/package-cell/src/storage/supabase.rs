use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::Package;
use super::PackageStore;

const PACKAGES: &str = "/rest/v1/packages";

pub struct SupabasePackageStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePackageStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PackageStore for SupabasePackageStore {
    async fn get_package(&self, package_id: Uuid, auth_token: &str) -> Result<Option<Package>> {
        let path = format!("{}?id=eq.{}", PACKAGES, package_id);
        let rows: Vec<Package> = self.supabase.select(&path, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_package(&self, package: &Package, auth_token: &str) -> Result<Package> {
        let rows: Vec<Package> = self.supabase
            .write_returning(Method::POST, PACKAGES, auth_token, serde_json::to_value(package)?)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create package"))
    }

    async fn packages_for_child(&self, child_id: Uuid, auth_token: &str) -> Result<Vec<Package>> {
        let path = format!(
            "{}?child_id=eq.{}&order=valid_until.asc,created_at.asc",
            PACKAGES, child_id
        );
        self.supabase.select(&path, auth_token).await
    }

    async fn compare_and_set_used(
        &self,
        package_id: Uuid,
        expected_used: i32,
        new_used: i32,
        auth_token: &str,
    ) -> Result<Option<Package>> {
        // The filter on the current value makes the PATCH a compare-and-set:
        // PostgREST returns no rows when someone else changed it first.
        let path = format!(
            "{}?id=eq.{}&used_sessions=eq.{}",
            PACKAGES, package_id, expected_used
        );
        debug!("Package {} used_sessions {} -> {}", package_id, expected_used, new_used);

        let rows: Vec<Package> = self.supabase
            .write_returning(Method::PATCH, &path, auth_token, json!({ "used_sessions": new_used }))
            .await?;
        Ok(rows.into_iter().next())
    }
}
