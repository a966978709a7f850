use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emotive::{ClassifierError, EmotionClassifier, Endpoint, EndpointConfig, LabelScore};

struct StubClassifier;

#[async_trait]
impl EmotionClassifier for StubClassifier {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        Ok(vec![
            LabelScore::new("joy", 0.91),
            LabelScore::new("sadness", 0.02),
            LabelScore::new("anger", 0.02),
            LabelScore::new("fear", 0.02),
            LabelScore::new("surprise", 0.02),
            LabelScore::new("disgust", 0.01),
        ])
    }
}

fn analyze_request(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn bench_request_path(c: &mut Criterion) {
    // The handler spawns the inference task, so it needs a live runtime.
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let endpoint = Endpoint::new(Arc::new(StubClassifier), EndpointConfig::default());

    let mut group = c.benchmark_group("Endpoint");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    group.bench_function("analyze_ok", |b| {
        b.iter(|| {
            runtime.block_on(endpoint.handle(black_box(analyze_request(
                r#"{"text": "Estoy muy feliz hoy"}"#,
            ))))
        })
    });

    group.bench_function("analyze_rejected", |b| {
        b.iter(|| runtime.block_on(endpoint.handle(black_box(analyze_request(r#"{"text": "   "}"#)))))
    });

    group.bench_function("preflight", |b| {
        b.iter(|| {
            let request = Request::builder()
                .method("OPTIONS")
                .uri("/analyze")
                .body(Body::empty())
                .unwrap();
            // Preflight never reaches the classifier; a bare executor is enough.
            tokio_test::block_on(endpoint.handle(black_box(request)))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_request_path);
criterion_main!(benches);
