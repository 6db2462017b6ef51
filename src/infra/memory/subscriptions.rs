use std::collections::BTreeSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::application::repos::{RepoError, SubscriptionsRepo};
use crate::domain::ids::UserId;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory::subscriptions";

/// Follow graph stored as ordered `(subscriber, target)` pairs.
#[derive(Default)]
pub struct MemorySubscriptionsRepo {
    pairs: RwLock<BTreeSet<(UserId, UserId)>>,
}

impl MemorySubscriptionsRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionsRepo for MemorySubscriptionsRepo {
    async fn subscribe(&self, subscriber: &UserId, target: &UserId) -> Result<(), RepoError> {
        rw_write(&self.pairs, SOURCE, "subscribe").insert((subscriber.clone(), target.clone()));
        Ok(())
    }

    async fn list_subscriptions(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        Ok(rw_read(&self.pairs, SOURCE, "list_subscriptions")
            .iter()
            .filter(|(subscriber, _)| subscriber == user)
            .map(|(_, target)| target.clone())
            .collect())
    }

    async fn list_subscribers(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        Ok(rw_read(&self.pairs, SOURCE, "list_subscribers")
            .iter()
            .filter(|(_, target)| target == user)
            .map(|(subscriber, _)| subscriber.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribing_twice_keeps_one_edge() {
        let repo = MemorySubscriptionsRepo::new();
        let alice = UserId::new("alice").expect("user");
        let bob = UserId::new("bob").expect("user");

        repo.subscribe(&alice, &bob).await.expect("subscribe");
        repo.subscribe(&alice, &bob).await.expect("subscribe again");

        assert_eq!(
            repo.list_subscriptions(&alice).await.expect("list"),
            vec![bob.clone()]
        );
        assert_eq!(repo.list_subscribers(&bob).await.expect("list"), vec![alice]);

        let carol = UserId::new("carol").expect("user");
        assert!(repo.list_subscribers(&carol).await.expect("list").is_empty());
    }
}
