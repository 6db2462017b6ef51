use std::sync::Arc;

use crate::application::posts::PostService;
use crate::application::subscriptions::SubscriptionService;

#[derive(Clone)]
pub struct ApiState {
    pub posts: Arc<PostService>,
    pub subscriptions: Arc<SubscriptionService>,
}
