//! Mock adapter for testing
//!
//! A scripted adapter plus a factory that records every call, so service and
//! sync-engine tests can verify dispatch, composed payloads, and
//! partial-failure handling without credentials or network access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::{
    AdapterFactory, PlatformAdapter, PublishContent, PublishOutcome, TestOutcome,
};
use crate::types::{EngagementMetrics, SocialConnection, SocialPlatform};

/// Scripted outcomes for one platform's adapter.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub test_result: std::result::Result<String, PlatformError>,
    pub publish_result: std::result::Result<Option<String>, PlatformError>,
    pub engagement_result: std::result::Result<EngagementMetrics, PlatformError>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            test_result: Ok("Mock account".to_string()),
            publish_result: Ok(Some("https://example.com/post/1".to_string())),
            engagement_result: Ok(EngagementMetrics::default()),
        }
    }
}

impl MockBehavior {
    pub fn publish_url(url: &str) -> Self {
        Self {
            publish_result: Ok(Some(url.to_string())),
            ..Default::default()
        }
    }

    pub fn publish_failure(error: &str) -> Self {
        Self {
            publish_result: Err(PlatformError::Provider(error.to_string())),
            ..Default::default()
        }
    }

    pub fn test_failure(error: &str) -> Self {
        Self {
            test_result: Err(PlatformError::Provider(error.to_string())),
            ..Default::default()
        }
    }

    pub fn engagement(metrics: EngagementMetrics) -> Self {
        Self {
            engagement_result: Ok(metrics),
            ..Default::default()
        }
    }

    pub fn engagement_failure(error: PlatformError) -> Self {
        Self {
            engagement_result: Err(error),
            ..Default::default()
        }
    }
}

/// Factory whose adapters share scripted behaviors and recorded calls.
#[derive(Clone, Default)]
pub struct MockAdapterFactory {
    behaviors: Arc<Mutex<HashMap<SocialPlatform, MockBehavior>>>,
    published: Arc<Mutex<Vec<(SocialPlatform, PublishContent)>>>,
    engagement_requests: Arc<Mutex<Vec<(SocialPlatform, Option<String>)>>>,
}

impl MockAdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behavior for one platform; unscripted platforms succeed.
    pub fn set(&self, platform: SocialPlatform, behavior: MockBehavior) {
        self.behaviors.lock().unwrap().insert(platform, behavior);
    }

    /// Every publish call observed, in order.
    pub fn published(&self) -> Vec<(SocialPlatform, PublishContent)> {
        self.published.lock().unwrap().clone()
    }

    /// Every engagement lookup observed, with the post URL it was given.
    pub fn engagement_requests(&self) -> Vec<(SocialPlatform, Option<String>)> {
        self.engagement_requests.lock().unwrap().clone()
    }
}

impl AdapterFactory for MockAdapterFactory {
    fn adapter_for(&self, connection: &SocialConnection) -> Box<dyn PlatformAdapter> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&connection.platform)
            .cloned()
            .unwrap_or_default();

        Box::new(MockAdapter {
            platform: connection.platform,
            behavior,
            published: self.published.clone(),
            engagement_requests: self.engagement_requests.clone(),
        })
    }
}

pub struct MockAdapter {
    platform: SocialPlatform,
    behavior: MockBehavior,
    published: Arc<Mutex<Vec<(SocialPlatform, PublishContent)>>>,
    engagement_requests: Arc<Mutex<Vec<(SocialPlatform, Option<String>)>>>,
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> SocialPlatform {
        self.platform
    }

    async fn test(&self) -> Result<TestOutcome> {
        match &self.behavior.test_result {
            Ok(info) => Ok(TestOutcome { info: info.clone() }),
            Err(e) => Err(e.clone().into()),
        }
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome> {
        self.published
            .lock()
            .unwrap()
            .push((self.platform, content.clone()));

        match &self.behavior.publish_result {
            Ok(post_url) => Ok(PublishOutcome {
                post_url: post_url.clone(),
            }),
            Err(e) => Err(e.clone().into()),
        }
    }

    async fn fetch_engagement(&self, post_url: Option<&str>) -> Result<EngagementMetrics> {
        self.engagement_requests
            .lock()
            .unwrap()
            .push((self.platform, post_url.map(str::to_string)));

        match &self.behavior.engagement_result {
            Ok(metrics) => Ok(*metrics),
            Err(e) => Err(e.clone().into()),
        }
    }
}
