// src/metrics.rs
//! Prometheus exposition for everything recorded through the `metrics` macros.

use anyhow::Context;
use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Sets the process-wide recorder; fails if one is already installed.
    pub fn init(fusion_threshold: f64) -> anyhow::Result<Self> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).context("installing the prometheus recorder")?;
        publish_settings(fusion_threshold);
        Ok(Self { handle })
    }

    /// `GET /metrics`, stateless apart from the recorder handle.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.handle.clone())
    }
}

fn publish_settings(fusion_threshold: f64) {
    describe_gauge!(
        "categorize_fusion_threshold",
        "Fused score a category needs to become a main category."
    );
    gauge!("categorize_fusion_threshold").set(fusion_threshold);
}

async fn render(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], handle.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{self, Body};
    use http::{Request, StatusCode};
    use tower::ServiceExt as _;

    #[tokio::test]
    async fn exposes_the_active_threshold() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || publish_settings(0.4));

        let resp = Metrics { handle }
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            EXPOSITION_CONTENT_TYPE
        );
        let bytes = body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE categorize_fusion_threshold gauge"), "{text}");
        assert!(text.contains("categorize_fusion_threshold 0.4"), "{text}");
    }
}
