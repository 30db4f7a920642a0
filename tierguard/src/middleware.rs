use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderValue};
use serde_json::json;
use tracing::{debug, warn};

use crate::engine::{QuotaEngine, UsageDecision};
use crate::tier::{AccountTier, ResourceType};

/// Caller identity resolved by an upstream auth layer and stashed in
/// request extensions. Absent identity means an anonymous visitor.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub subject_id: String,
    pub tier: AccountTier,
}

#[derive(Clone)]
pub struct QuotaLayerState {
    pub engine: Arc<QuotaEngine>,
}

/// Quota headers attached to gated responses.
#[derive(Debug, Clone)]
pub struct QuotaHeaders {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64, // Unix timestamp
    pub retry_after: Option<i64>, // Seconds
}

impl QuotaHeaders {
    pub fn from_decision(decision: &UsageDecision) -> Self {
        let reset = decision.reset_at.timestamp();
        Self {
            limit: decision.limit,
            remaining: decision.remaining,
            reset,
            retry_after: if decision.admitted {
                None
            } else {
                Some((decision.reset_at - chrono::Utc::now()).num_seconds().max(0))
            },
        }
    }

    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        // These conversions are safe because we're converting numbers to strings.
        if let Ok(value) = HeaderValue::from_str(&self.limit.to_string()) {
            headers.insert("X-Quota-Limit", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.remaining.to_string()) {
            headers.insert("X-Quota-Remaining", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.reset.to_string()) {
            headers.insert("X-Quota-Reset", value);
        }
        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                headers.insert("Retry-After", value);
            }
        }

        headers
    }
}

/// Middleware gating a route on the caller's quota.
///
/// The gated resource comes from a `ResourceType` extension (set by the
/// router) or the `x-quota-resource` header; routes declaring neither pass
/// through untouched. Admitted requests get `X-Quota-*` headers; denials
/// short-circuit with `429` and a machine-readable `reset_at`.
pub async fn quota_middleware(
    State(state): State<QuotaLayerState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(resource) = extract_resource(&request) else {
        return Ok(next.run(request).await);
    };

    let identity = request
        .extensions()
        .get::<RequestIdentity>()
        .cloned()
        .unwrap_or_else(|| RequestIdentity {
            subject_id: "anonymous".to_string(),
            tier: AccountTier::Anonymous,
        });

    debug!(
        subject = identity.subject_id,
        resource = %resource,
        tier = %identity.tier,
        "checking quota"
    );

    let decision = state
        .engine
        .evaluate(&identity.subject_id, resource, identity.tier)
        .await;
    let headers = QuotaHeaders::from_decision(&decision);

    if decision.admitted {
        let mut response = next.run(request).await;
        response.headers_mut().extend(headers.to_header_map());
        Ok(response)
    } else {
        warn!(
            subject = identity.subject_id,
            resource = %resource,
            current = decision.current,
            limit = decision.limit,
            "quota exceeded"
        );

        let body = json!({
            "error": {
                "message": format!("Quota exceeded for {resource}"),
                "type": "quota_exhausted",
                "reset_at": decision.reset_at.to_rfc3339(),
            }
        });
        let mut response =
            (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
        response.headers_mut().extend(headers.to_header_map());
        Err(response)
    }
}

fn extract_resource(request: &Request) -> Option<ResourceType> {
    if let Some(resource) = request.extensions().get::<ResourceType>() {
        return Some(*resource);
    }
    request
        .headers()
        .get("x-quota-resource")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| ResourceType::from_str(v).ok())
}
