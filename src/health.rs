//! Health check endpoints for Kubernetes readiness and liveness probes.
//!
//! Registered as an ordinary controller, so the probes go through the same
//! routing and resolution path as application actions:
//! - `/health` - Basic health check (always returns 200 OK)
//! - `/health/ready` - Readiness probe with uptime
//! - `/health/live` - Liveness probe (always returns 200 OK)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::Body;
use crate::traits::{Controller, ControllerRegistrar};

/// Health status enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "healthy")]
    Healthy,
    #[serde(rename = "unhealthy")]
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

pub struct HealthController {
    started_at: DateTime<Utc>,
}

impl HealthController {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Healthy,
        }
    }

    pub fn ready(&self) -> ReadinessResponse {
        ReadinessResponse {
            status: HealthStatus::Healthy,
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
        }
    }

    pub fn live(&self) -> HealthResponse {
        self.health()
    }
}

impl Default for HealthController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for HealthController {
    fn configure(registrar: &mut ControllerRegistrar<Self>) {
        registrar.base_path("/health");
        registrar.get("/", "health", |controller: Arc<Self>, _| async move {
            Body::json(&controller.health()).map(Some)
        });
        registrar.get("/ready", "ready", |controller: Arc<Self>, _| async move {
            Body::json(&controller.ready()).map(Some)
        });
        registrar.get("/live", "live", |controller: Arc<Self>, _| async move {
            Body::json(&controller.live()).map(Some)
        });
    }
}
