//! Route checks over HTTP: a 2xx response passes, anything else fails with
//! `HTTP <code> <reason>` so the classifier can pick it up.

use super::{DetectContext, Detector};
use crate::errors::DetectorError;
use async_trait::async_trait;
use remedy_common::DetectorReport;
use std::time::Duration;

const MAX_BODY_CHARS: usize = 500;

pub struct HttpDetector {
    area: String,
    url: String,
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpDetector {
    pub fn new(area: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            url: url.into(),
            client: reqwest::Client::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Detector for HttpDetector {
    fn area(&self) -> &str {
        &self.area
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn detect(&self, _ctx: &DetectContext) -> Result<DetectorReport, DetectorError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DetectorError::Http {
                area: self.area.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let line = format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string();

        if status.is_success() {
            return Ok(DetectorReport::passed(format!("{} {}", line, self.url)));
        }

        let body: String = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_BODY_CHARS)
            .collect();
        Ok(DetectorReport {
            success: false,
            output: Some(format!("{} {}", line, self.url)),
            error: (!body.trim().is_empty()).then(|| body.trim().to_string()),
            ..Default::default()
        })
    }
}
