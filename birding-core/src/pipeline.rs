//! Stage driver.
//!
//! Runs Connector, Health Checker, Reader and Writer in that order against a
//! single handle. The first failing stage ends the run; its error is tagged
//! with the [`Stage`] it came from. The handle is closed on every path once
//! it has been opened.

use crate::{
    adapters::{self, BirdStore, ConnectionConfig},
    error::BirdingError,
    models::{Bird, RunReport, format_birds},
};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    HealthCheck,
    Read,
    Write,
    /// Writing results to the output
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::HealthCheck => "health check",
            Stage::Read => "read",
            Stage::Write => "write",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

impl Stage {
    /// Attributes `source` to this stage.
    pub fn failed(self, source: BirdingError) -> PipelineError {
        PipelineError {
            stage: self,
            source,
        }
    }
}

/// A stage failure. Always fatal for the run.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: BirdingError,
}

impl PipelineError {
    /// One-line diagnostic with the full cause chain, driver errors included.
    ///
    /// ```rust
    /// use birding_core::{BirdingError, Stage};
    ///
    /// let err = Stage::Write.failed(BirdingError::missing_metadata("no row count"));
    /// assert_eq!(
    ///     err.diagnostic(),
    ///     "write failed: Result metadata unavailable: no row count"
    /// );
    /// ```
    pub fn diagnostic(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(&self.source);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }
}

/// Which stages after the health check to run.
///
/// Connect and health check always run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Run the Reader
    pub read: bool,
    /// Run the Writer with this bird
    pub write: Option<Bird>,
}

impl Default for Plan {
    fn default() -> Self {
        Self::full(Bird::rooster())
    }
}

impl Plan {
    /// Every stage, inserting `bird`.
    pub fn full(bird: Bird) -> Self {
        Self {
            read: true,
            write: Some(bird),
        }
    }

    /// Connect and health check only.
    pub fn health_check() -> Self {
        Self {
            read: false,
            write: None,
        }
    }

    /// Read without writing.
    pub fn list() -> Self {
        Self {
            read: true,
            write: None,
        }
    }

    /// Write without reading.
    pub fn add(bird: Bird) -> Self {
        Self {
            read: false,
            write: Some(bird),
        }
    }
}

/// How results are written to the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// One line per completed stage
    #[default]
    Text,
    /// A single pretty-printed [`RunReport`] after the last stage
    Json,
}

/// Runs the planned stages against `config`, writing results to `out`.
///
/// # Errors
/// Returns the first stage failure. In text mode, lines for stages that
/// completed before it have already been written.
pub async fn run<W>(
    config: &ConnectionConfig,
    plan: &Plan,
    format: ReportFormat,
    out: &mut W,
) -> Result<RunReport, PipelineError>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    info!("Connecting to {}", config.redacted_url());
    let store = adapters::open(config).map_err(|e| Stage::Connect.failed(e))?;
    debug!("Opened {} handle", store.database_type());

    let outcome = run_stages(store.as_ref(), plan, format, out).await;

    store.close().await;
    debug!("Closed {} handle", store.database_type());

    outcome
}

async fn run_stages<W>(
    store: &dyn BirdStore,
    plan: &Plan,
    format: ReportFormat,
    out: &mut W,
) -> Result<RunReport, PipelineError>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let text = format == ReportFormat::Text;
    let mut report = RunReport::default();

    store
        .ping()
        .await
        .map_err(|e| Stage::HealthCheck.failed(e))?;
    report.reachable = true;
    info!("Database is reachable");
    if text {
        write_line(out, "database is reachable").await?;
    }

    if plan.read {
        let cursor = store.query().await.map_err(|e| Stage::Read.failed(e))?;
        if let Err(e) = cursor.drain(&mut report.birds).await {
            warn!(
                "Read stopped after {} birds; partial results discarded",
                report.birds.len()
            );
            return Err(Stage::Read.failed(e));
        }
        info!("Read {} birds", report.birds.len());
        if text {
            let line = format!(
                "found {} birds: {}",
                report.birds.len(),
                format_birds(&report.birds)
            );
            write_line(out, &line).await?;
        }
    }

    if let Some(bird) = &plan.write {
        let inserted = store
            .insert_bird(bird)
            .await
            .map_err(|e| Stage::Write.failed(e))?;
        report.inserted = Some(inserted);
        info!("Inserted {} rows", inserted);
        if text {
            write_line(out, &format!("inserted {} rows", inserted)).await?;
        }
    }

    if !text {
        let json = serde_json::to_string_pretty(&report).map_err(|e| {
            Stage::Report.failed(BirdingError::Io {
                context: "Failed to serialize run report".to_string(),
                source: e.into(),
            })
        })?;
        write_line(out, &json).await?;
    }

    Ok(report)
}

/// Writes `line` and a newline, then flushes.
async fn write_line<W>(out: &mut W, line: &str) -> Result<(), PipelineError>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let io_failed = |e: std::io::Error| {
        Stage::Report.failed(BirdingError::Io {
            context: "Failed to write results".to_string(),
            source: e,
        })
    };

    out.write_all(line.as_bytes()).await.map_err(io_failed)?;
    out.write_all(b"\n").await.map_err(io_failed)?;
    out.flush().await.map_err(io_failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Connect.to_string(), "connect");
        assert_eq!(Stage::HealthCheck.to_string(), "health check");
        assert_eq!(Stage::Read.to_string(), "read");
        assert_eq!(Stage::Write.to_string(), "write");
        assert_eq!(Stage::Report.to_string(), "report");
    }

    #[test]
    fn test_diagnostic_includes_driver_cause() {
        let driver = std::io::Error::other("connection refused");
        let err = Stage::HealthCheck.failed(BirdingError::unreachable("localhost:5432", driver));

        assert_eq!(
            err.to_string(),
            "health check failed: Database unreachable: localhost:5432"
        );
        assert_eq!(
            err.diagnostic(),
            "health check failed: Database unreachable: localhost:5432: connection refused"
        );
    }

    #[test]
    fn test_plans() {
        assert_eq!(Plan::default(), Plan::full(Bird::rooster()));
        assert!(!Plan::health_check().read);
        assert!(Plan::health_check().write.is_none());
        assert!(Plan::list().read && Plan::list().write.is_none());

        let owl = Bird::new("owl", "hoots");
        assert_eq!(Plan::add(owl.clone()).write, Some(owl));
        assert!(!Plan::add(Bird::rooster()).read);
    }

    #[tokio::test]
    async fn test_connect_failure_is_tagged() {
        let config = ConnectionConfig::new("mysql://localhost/birding");
        let mut out = Vec::new();

        let err = run(&config, &Plan::default(), ReportFormat::Text, &mut out)
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Connect);
        assert!(matches!(err.source, BirdingError::Configuration { .. }));
        assert!(out.is_empty());
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_output_failure_is_report_stage() {
        let err = write_line(&mut BrokenPipe, "database is reachable")
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Report);
        assert!(matches!(err.source, BirdingError::Io { .. }));
    }
}
