use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per therapist. Booking, approval and completion for a
/// therapist run one at a time within this process.
#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, therapist_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(therapist_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_therapist_waits_for_the_holder() {
        let locks = Arc::new(SlotLocks::new());
        let therapist = Uuid::new_v4();

        let guard = locks.lock(therapist).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(therapist).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_therapists_do_not_contend() {
        let locks = SlotLocks::new();
        let _first = locks.lock(Uuid::new_v4()).await;
        let _second = locks.lock(Uuid::new_v4()).await;
    }
}
