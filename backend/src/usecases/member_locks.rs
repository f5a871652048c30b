use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per member. Every credit, slot and booking mutation for a member runs
/// while holding its guard, so operations on the same member never interleave while
/// different members proceed in parallel.
#[derive(Default)]
pub struct MemberLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Proof that the holder owns the member's lock. Released on drop.
pub struct MemberGuard {
    member_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl MemberGuard {
    pub fn member_id(&self) -> Uuid {
        self.member_id
    }
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, member_id: Uuid) -> MemberGuard {
        // Clone the Arc out so the shard lock is not held across the await.
        let mutex = Arc::clone(
            self.locks
                .entry(member_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        MemberGuard {
            member_id,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Drops entries nobody holds or waits on. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_member_waits_for_release() {
        let locks = Arc::new(MemberLocks::new());
        let member_id = Uuid::new_v4();

        let guard = locks.lock(member_id).await;
        assert_eq!(guard.member_id(), member_id);

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(member_id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender acquires after release")
            .unwrap();
    }

    #[tokio::test]
    async fn different_members_do_not_block() {
        let locks = MemberLocks::new();

        let _first = locks.lock(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(Uuid::new_v4())).await;

        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = MemberLocks::new();
        let held = Uuid::new_v4();

        let _guard = locks.lock(held).await;
        drop(locks.lock(Uuid::new_v4()).await);

        assert_eq!(locks.len(), 2);
        assert_eq!(locks.prune_idle(), 1);
        assert_eq!(locks.len(), 1);
    }
}
