//! HTTP surface tests against an ephemeral Postgres database. Set
//! `ROSTER_PG_DSN` to a reachable server to run them.

use axum::{
	body::{self, Body},
	http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;
use uuid::Uuid;

use roster_api::{routes, state::AppState};
use roster_config::{Config, MatchField, Matching, Postgres, Service, Storage, Worker};
use roster_testkit::TestDatabase;

fn test_config(dsn: String) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage { postgres: Postgres { dsn, pool_max_conns: 2 } },
		matching: Matching {
			cutoff: 0.1,
			page_size: 1_000,
			flush_size: 1_000,
			require_matching_sex: true,
			prefilter_floor: 0.05,
			fields: vec![MatchField {
				key: "name".to_string(),
				weight: 1.0,
				mechanism: "weighted".to_string(),
				strategy: "name".to_string(),
			}],
		},
		worker: Worker { scan_interval_secs: 300 },
	}
}

async fn test_state() -> Option<(TestDatabase, AppState)> {
	let Some(base_dsn) = roster_testkit::env_dsn() else {
		eprintln!("Skipping HTTP test; set ROSTER_PG_DSN to run it.");

		return None;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let config = test_config(test_db.dsn().to_string());
	let state = AppState::new(config).await.expect("Failed to initialize app state.");

	Some((test_db, state))
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

async fn body_json(response: axum::response::Response) -> Value {
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&bytes).expect("Response body must be JSON.")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn health_ok() {
	let Some((test_db, state)) = test_state().await else {
		return;
	};
	let app = routes::router(state);
	let response = app
		.oneshot(
			Request::builder()
				.uri("/health")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn listing_starts_empty() {
	let Some((test_db, state)) = test_state().await else {
		return;
	};
	let app = routes::router(state);
	let response = app
		.oneshot(
			Request::builder()
				.uri("/v1/duplicates?limit=10")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /v1/duplicates.");

	assert_eq!(response.status(), StatusCode::OK);

	let payload = body_json(response).await;

	assert_eq!(payload["total"], json!(0));
	assert_eq!(payload["items"], json!([]));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn merge_rejects_a_self_pair() {
	let Some((test_db, state)) = test_state().await else {
		return;
	};
	let app = routes::router(state);
	let id = Uuid::new_v4();
	let response = app
		.oneshot(json_request(
			"/v1/duplicates/merge",
			json!({ "record_a": id, "record_b": id }),
		))
		.await
		.expect("Failed to call /v1/duplicates/merge.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let payload = body_json(response).await;

	assert_eq!(payload["error_code"], json!("invalid_request"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn merge_of_missing_records_maps_to_not_found() {
	let Some((test_db, state)) = test_state().await else {
		return;
	};
	let app = routes::router(state);
	let response = app
		.oneshot(json_request(
			"/v1/duplicates/merge",
			json!({ "record_a": Uuid::new_v4(), "record_b": Uuid::new_v4() }),
		))
		.await
		.expect("Failed to call /v1/duplicates/merge.");

	assert_eq!(response.status(), StatusCode::NOT_FOUND);

	let payload = body_json(response).await;

	assert_eq!(payload["error_code"], json!("not_found"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn check_requires_at_least_one_record() {
	let Some((test_db, state)) = test_state().await else {
		return;
	};
	let app = routes::router(state);
	let response = app
		.oneshot(json_request("/v1/duplicates/check", json!({ "records": [] })))
		.await
		.expect("Failed to call /v1/duplicates/check.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn admin_scan_reports_an_empty_summary() {
	let Some((test_db, state)) = test_state().await else {
		return;
	};
	let admin = routes::admin_router(state);
	let response = admin
		.oneshot(json_request("/v1/admin/scan", json!({})))
		.await
		.expect("Failed to call /v1/admin/scan.");

	assert_eq!(response.status(), StatusCode::OK);

	let payload = body_json(response).await;

	assert_eq!(payload["pages"], json!(0));
	assert_eq!(payload["exact"], json!(0));
	assert_eq!(payload["weighted"], json!(0));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
