//! Shared helpers for qv-server integration tests
//!
//! Each test gets its own in-memory database, a clock pinned to
//! 2024-03-04 09:00 (shift A under the default rotating pattern) and three
//! floor users besides the bootstrap admin.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt;

use qv_common::config::QvConfig;
use qv_common::db::init::{init_memory_database, BOOTSTRAP_ADMIN_USERNAME};
use qv_common::models::Role;
use qv_common::time::FixedClock;
use qv_common::tolerance::ToleranceTable;
use qv_server::db::users;
use qv_server::{build_router, AppState};

pub const OPERATOR: &str = "op1";
pub const OTHER_OPERATOR: &str = "op2";
pub const SUPERVISOR: &str = "sup1";
pub const QUALITY: &str = "qa1";
pub const ADMIN: &str = BOOTSTRAP_ADMIN_USERNAME;

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub clock: FixedClock,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_template(PathBuf::from("/nonexistent/report_template.toml")).await
    }

    pub async fn with_template(export_template: PathBuf) -> Self {
        let pool = init_memory_database(&QvConfig::default())
            .await
            .expect("Failed to create in-memory database");

        {
            let mut conn = pool.acquire().await.unwrap();
            let created = at(1, 8, 0);
            for (username, role) in [
                (OPERATOR, Role::Operator),
                (OTHER_OPERATOR, Role::Operator),
                (SUPERVISOR, Role::ShiftSupervisor),
                (QUALITY, Role::QualitySupervisor),
            ] {
                users::insert_user(&mut conn, username, username, role, created)
                    .await
                    .unwrap();
            }
        }

        let clock = FixedClock::new(at(4, 9, 0));
        let state = AppState::new(pool.clone(), ToleranceTable::default(), export_template)
            .with_clock(Arc::new(clock.clone()));

        Self {
            router: build_router(state),
            pool,
            clock,
        }
    }

    /// Send a request and return the status plus raw body bytes
    pub async fn raw(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("X-QV-User", user);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, bytes.to_vec())
    }

    /// Send a request and parse the JSON response (Null for empty bodies)
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        user: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, bytes) = self.raw(method, uri, Some(user), body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.call("GET", uri, user, None).await
    }

    pub async fn post(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, user, Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call("PUT", uri, user, Some(body)).await
    }

    /// Open (or fetch) the user's record for the current shift
    pub async fn open_verification(&self, user: &str) -> String {
        let (status, json) = self.call("POST", "/api/verifications", user, None).await;
        assert!(status.is_success(), "open verification: {} {}", status, json);
        json["id"].as_str().unwrap().to_string()
    }

    /// Limit checklists to `max` subgroups, one every `interval` minutes
    pub async fn set_sampling(&self, interval: i64, max: i64) {
        let (status, json) = self
            .put(
                "/api/settings",
                ADMIN,
                serde_json::json!({
                    "sampling_interval_minutes": interval,
                    "sampling_max_subgroups": max,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", json);
    }

    pub async fn create_checklist(&self, user: &str, verification_id: &str, model: &str) -> Value {
        let (status, json) = self
            .post(
                "/api/checklists",
                user,
                serde_json::json!({
                    "verification_id": verification_id,
                    "model": model,
                    "line": "L3",
                    "machine": "LT-01",
                    "readings": { "line_pressure": 5.0, "oring_condition": "OK" },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", json);
        json
    }

    pub async fn add_subgroup(&self, user: &str, checklist_id: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/api/checklists/{}/subgroups", checklist_id),
            user,
            serde_json::json!({ "readings": [1.0, 1.1, 0.9] }),
        )
        .await
    }
}
