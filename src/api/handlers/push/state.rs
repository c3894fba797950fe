//! Shared handler state for the push auth endpoints.

use std::sync::Arc;

use super::rate_limit::RateLimiter;
use crate::push::service::PushAuthService;

pub struct PushState {
    service: Arc<PushAuthService>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl PushState {
    #[must_use]
    pub fn new(service: Arc<PushAuthService>, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            service,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn service(&self) -> &PushAuthService {
        &self.service
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
