// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote row API (PostgREST dialect).
//!
//! Provides [`RestClient`], which handles authentication headers, filter
//! construction, per-request timeouts, and error decoding.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lectern_config::model::RemoteConfig;
use lectern_core::{AttendanceEntry, AttendanceProbe, LecternError, RemoteBackend, Student};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::mapping::{attendance_from_row, new_attendance_row, new_student_row, student_from_row};
use crate::types::{ApiErrorBody, AttendanceRow, StudentRow};

const REST_PATH: &str = "rest/v1";
const STUDENTS: &str = "students";
const ATTENDANCE: &str = "attendance";

/// Client for the `students` and `attendance` tables.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    rest_url: String,
    timeout: Duration,
}

impl RestClient {
    /// Creates a client for the backend at `base_url`.
    pub fn new(
        base_url: &str,
        api_key: &SecretString,
        timeout: Duration,
    ) -> Result<Self, LecternError> {
        let key = api_key.expose_secret();
        let mut headers = HeaderMap::new();
        let mut apikey = HeaderValue::from_str(key)
            .map_err(|e| LecternError::Config(format!("invalid API key header value: {e}")))?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| LecternError::Config(format!("invalid API key header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LecternError::remote("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            rest_url: format!("{}/{REST_PATH}", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    /// Build a client from configuration; `None` when no URL is configured.
    pub fn from_config(config: &RemoteConfig) -> Result<Option<Self>, LecternError> {
        let Some(url) = config.url.as_deref() else {
            return Ok(None);
        };
        let key = SecretString::from(config.api_key.clone().unwrap_or_default());
        Self::new(url, &key, config.request_timeout()).map(Some)
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, LecternError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        debug!(status = %status, url = %response.url().path(), "remote response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) if !err.message.is_empty() => match err.code {
                Some(code) => format!("remote returned {status} ({code}): {}", err.message),
                None => format!("remote returned {status}: {}", err.message),
            },
            _ => format!("remote returned {status}: {body}"),
        };
        Err(LecternError::Remote {
            message,
            source: None,
        })
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, LecternError> {
        self.send(request)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> LecternError {
        if e.is_timeout() {
            LecternError::Timeout {
                duration: self.timeout,
            }
        } else if e.is_decode() {
            LecternError::remote("failed to decode response", e)
        } else {
            LecternError::remote("HTTP request failed", e)
        }
    }

    fn single<T>(rows: Vec<T>, what: &str) -> Result<T, LecternError> {
        rows.into_iter().next().ok_or_else(|| LecternError::Remote {
            message: format!("{what} returned no row"),
            source: None,
        })
    }
}

#[async_trait]
impl RemoteBackend for RestClient {
    async fn ping(&self) -> Result<(), LecternError> {
        self.send(
            self.client
                .get(self.table(STUDENTS))
                .query(&[("select", "id"), ("limit", "1")]),
        )
        .await?;
        Ok(())
    }

    async fn fetch_students(&self) -> Result<Vec<Student>, LecternError> {
        let rows: Vec<StudentRow> = self
            .rows(
                self.client
                    .get(self.table(STUDENTS))
                    .query(&[("select", "*"), ("order", "student_id.asc")]),
            )
            .await?;
        debug!(count = rows.len(), "fetched students");
        Ok(rows.into_iter().map(student_from_row).collect())
    }

    async fn fetch_attendance(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AttendanceEntry>, LecternError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "timestamp.desc".to_string()),
        ];
        if let Some(since) = since {
            query.push(("timestamp", format!("gte.{}", since.to_rfc3339())));
        }
        let rows: Vec<AttendanceRow> = self
            .rows(self.client.get(self.table(ATTENDANCE)).query(&query))
            .await?;
        debug!(count = rows.len(), since = ?since, "fetched attendance");
        rows.into_iter().map(attendance_from_row).collect()
    }

    async fn insert_student(&self, student: &Student) -> Result<Student, LecternError> {
        let rows: Vec<StudentRow> = self
            .rows(
                self.client
                    .post(self.table(STUDENTS))
                    .header("Prefer", "return=representation")
                    .json(&[new_student_row(student)]),
            )
            .await?;
        Self::single(rows, "student insert").map(student_from_row)
    }

    async fn update_student(&self, student: &Student) -> Result<Student, LecternError> {
        let rows: Vec<StudentRow> = self
            .rows(
                self.client
                    .patch(self.table(STUDENTS))
                    .query(&[("id", format!("eq.{}", student.id))])
                    .header("Prefer", "return=representation")
                    .json(&new_student_row(student)),
            )
            .await?;
        Self::single(rows, "student update").map(student_from_row)
    }

    async fn insert_attendance(
        &self,
        entry: &AttendanceEntry,
    ) -> Result<AttendanceEntry, LecternError> {
        let rows: Vec<AttendanceRow> = self
            .rows(
                self.client
                    .post(self.table(ATTENDANCE))
                    .header("Prefer", "return=representation")
                    .json(&[new_attendance_row(entry)]),
            )
            .await?;
        Self::single(rows, "attendance insert").and_then(attendance_from_row)
    }

    async fn find_matching_attendance(
        &self,
        probe: &AttendanceProbe,
    ) -> Result<Option<AttendanceEntry>, LecternError> {
        let (from, to) = probe.window();
        let owner = match &probe.student_uuid {
            Some(uuid) => ("student_uuid", format!("eq.{uuid}")),
            None => ("student_id", format!("eq.{}", probe.student_id)),
        };
        let query = [
            ("select", "*".to_string()),
            owner,
            ("type", format!("eq.{}", probe.direction)),
            ("timestamp", format!("gte.{}", from.to_rfc3339())),
            ("timestamp", format!("lte.{}", to.to_rfc3339())),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<AttendanceRow> = self
            .rows(self.client.get(self.table(ATTENDANCE)).query(&query))
            .await?;
        rows.into_iter().next().map(attendance_from_row).transpose()
    }
}
