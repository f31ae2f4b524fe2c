use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use shared_database::supabase::SupabaseClient;

/// Blob storage for uploaded reports and documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `bucket/object_path` and returns a URL for it.
    async fn put(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<String>;
}

pub struct SupabaseObjectStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseObjectStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl ObjectStore for SupabaseObjectStore {
    async fn put(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<String> {
        self.supabase
            .upload_object(bucket, object_path, bytes, content_type, auth_token)
            .await
    }
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(url).cloned()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        _auth_token: &str,
    ) -> Result<String> {
        let url = format!("memory://{}/{}", bucket, object_path);
        self.objects.write().await.insert(url.clone(), bytes);
        Ok(url)
    }
}
