//! Per-user conversation state, owned by an explicit store.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::user::UserId;
use crate::flows::states::{ActiveFlow, FlowKind};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub flow: Option<ActiveFlow>,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        self.flow.is_none()
    }

    pub fn active(&self) -> Option<&ActiveFlow> {
        self.flow.as_ref()
    }

    pub fn active_kind(&self) -> Option<FlowKind> {
        self.flow.as_ref().map(|flow| flow.kind)
    }

    pub fn begin(&mut self, flow: ActiveFlow) {
        self.flow = Some(flow);
    }

    /// Back to idle; collected fields are discarded.
    pub fn clear(&mut self) {
        self.flow = None;
    }
}

/// Lock held for one unit of work on one user's state.
pub type SessionGuard = OwnedMutexGuard<ConversationState>;

#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<UserId, Arc<Mutex<ConversationState>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the user's state, creating it idle on first use. Events for the same user
    /// queue behind the guard; other users are unaffected.
    pub async fn lock(&self, user: UserId) -> SessionGuard {
        let existing = self.sessions.read().await.get(&user).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut sessions = self.sessions.write().await;
                sessions.entry(user).or_default().clone()
            }
        };
        slot.lock_owned().await
    }

    pub async fn snapshot(&self, user: UserId) -> ConversationState {
        let slot = self.sessions.read().await.get(&user).cloned();
        match slot {
            Some(slot) => slot.lock().await.clone(),
            None => ConversationState::default(),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::SessionStore;
    use crate::domain::user::UserId;
    use crate::flows::states::{ActiveFlow, FlowKind};

    #[tokio::test]
    async fn state_is_created_lazily_and_idle() {
        let store = SessionStore::new();
        assert!(store.is_empty().await);

        let guard = store.lock(UserId(1)).await;
        assert!(guard.is_idle());
        drop(guard);

        assert_eq!(store.len().await, 1);
        assert!(store.snapshot(UserId(2)).await.is_idle());
    }

    #[tokio::test]
    async fn mutations_persist_between_locks() {
        let store = SessionStore::new();
        {
            let mut guard = store.lock(UserId(1)).await;
            guard.begin(ActiveFlow::new(FlowKind::Registration));
        }

        let snapshot = store.snapshot(UserId(1)).await;
        assert_eq!(snapshot.active_kind(), Some(FlowKind::Registration));

        store.lock(UserId(1)).await.clear();
        assert!(store.snapshot(UserId(1)).await.is_idle());
    }

    #[tokio::test]
    async fn same_user_is_serialized_while_other_users_proceed() {
        let store = SessionStore::new();
        let held = store.lock(UserId(1)).await;

        let contender = store.clone();
        let blocked = tokio::spawn(async move {
            let _guard = contender.lock(UserId(1)).await;
        });

        let other = tokio::time::timeout(Duration::from_secs(1), store.lock(UserId(2))).await;
        assert!(other.is_ok(), "a different user must not wait");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished(), "same user must wait for the held lock");

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("waiter finishes after release")
            .expect("waiter task does not panic");
    }
}
