use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use tracing::{info, instrument, warn};

use crate::error::IngestError;
use crate::periods::normalize::normalize;
use crate::periods::select::select_defaults;
use crate::periods::source::{PeriodFetch, PeriodSource};
use crate::periods::{PeriodRecord, PeriodSelection};
use crate::table::{decode, ParsedTable};
use crate::upload::{UploadEnvelope, UploadSink};

/// User-visible outcome of the last operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success(String),
    Error(String),
}

/// One ingestion session: the periods on offer, the current from/to
/// selection, and at most one parsed table awaiting confirmation.
///
/// All mutation goes through `&mut self` methods, so operations are
/// serialized by construction; nothing here is shared across threads. The
/// session is created per ingestion flow and simply dropped at the end.
pub struct IngestSession<F: PeriodFetch, S: UploadSink> {
    source_id: String,
    source_label: String,
    period_source: PeriodSource<F>,
    sink: S,
    periods: Vec<PeriodRecord>,
    selection: PeriodSelection,
    table: Option<ParsedTable>,
    file_name: Option<String>,
    status: Option<Status>,
}

impl<F: PeriodFetch, S: UploadSink> IngestSession<F, S> {
    pub fn new(
        source_id: impl Into<String>,
        source_label: impl Into<String>,
        period_source: PeriodSource<F>,
        sink: S,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_label: source_label.into(),
            period_source,
            sink,
            periods: Vec::new(),
            selection: PeriodSelection::default(),
            table: None,
            file_name: None,
            status: None,
        }
    }

    pub fn periods(&self) -> &[PeriodRecord] {
        &self.periods
    }

    pub fn selection(&self) -> &PeriodSelection {
        &self.selection
    }

    pub fn table(&self) -> Option<&ParsedTable> {
        self.table.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn set_from_period(&mut self, id: impl Into<String>) {
        self.selection.from_period_id = id.into();
    }

    pub fn set_to_period(&mut self, id: impl Into<String>) {
        self.selection.to_period_id = id.into();
    }

    /// Fetch, normalize and auto-select periods. Never fails: endpoint
    /// exhaustion is absorbed by the source's default payload, and an
    /// empty normalized list only sets an error status.
    pub async fn load_periods(&mut self) {
        self.load_periods_at(Utc::now().date_naive()).await
    }

    #[instrument(level = "info", skip(self))]
    pub async fn load_periods_at(&mut self, today: NaiveDate) {
        let payload = self.period_source.fetch_periods(today).await;
        self.periods = normalize(&payload);
        if self.periods.is_empty() {
            warn!("period payload normalized to an empty list");
            self.status = Some(Status::Error("No periods available in the system.".into()));
        } else {
            info!(count = self.periods.len(), "periods loaded");
        }
        // Defaults are a pure function of the list and the date; recompute
        // on every load rather than carrying stale picks forward.
        self.selection = select_defaults(&self.periods, today);
    }

    /// Decode a newly chosen file, replacing any held table wholesale.
    ///
    /// The decode is CPU-bound and runs on the blocking pool. Calls are
    /// serialized through `&mut self`, so the newest selection always wins;
    /// failure leaves no table behind, even if an earlier file had parsed
    /// cleanly.
    pub async fn select_file(&mut self, bytes: Vec<u8>, name: &str) -> Result<(), IngestError> {
        let owned_name = name.to_string();
        let decoded = tokio::task::spawn_blocking(move || decode::parse(&bytes, &owned_name))
            .await
            .map_err(|e| IngestError::Decode {
                name: name.to_string(),
                source: anyhow!(e),
            });

        match decoded.and_then(|r| r) {
            Ok(table) => {
                info!(name, rows = table.row_count(), "file parsed");
                self.table = Some(table);
                self.file_name = Some(name.to_string());
                self.status = None;
                Ok(())
            }
            Err(err) => {
                warn!(name, error = %err, "file rejected");
                self.table = None;
                self.file_name = None;
                self.status = Some(Status::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Discard the held table, file metadata and any message.
    pub fn clear_file(&mut self) {
        self.table = None;
        self.file_name = None;
        self.status = None;
    }

    /// Build the envelope and hand it to the sink. Refuses locally, with no
    /// network call, unless a non-empty table is held and both periods are
    /// selected. A failed upload preserves the table and file name so the
    /// user can retry without re-selecting the file.
    #[instrument(level = "info", skip(self))]
    pub async fn submit(&mut self) -> Result<(), IngestError> {
        let table = match self.table.as_ref().filter(|t| !t.rows.is_empty()) {
            Some(table) => table,
            None => {
                return Err(self.reject_submit(IngestError::MissingSelection(
                    "select a file with at least one data row before uploading",
                )))
            }
        };
        if !self.selection.is_complete() {
            return Err(self.reject_submit(IngestError::MissingSelection(
                "select both a from period and a to period before uploading",
            )));
        }

        let envelope = UploadEnvelope {
            source_id: self.source_id.clone(),
            source_label: self.source_label.clone(),
            from_period_id: self.selection.from_period_id.clone(),
            to_period_id: self.selection.to_period_id.clone(),
            file_name: self.file_name.clone().unwrap_or_default(),
            row_count: table.row_count(),
            rows: table.rows.clone(),
        };

        match self.sink.upload(&envelope).await {
            Ok(()) => {
                info!(rows = envelope.row_count, "upload accepted");
                self.status = Some(Status::Success(format!(
                    "Uploaded {} rows from {}.",
                    envelope.row_count, envelope.file_name
                )));
                self.table = None;
                self.file_name = None;
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "upload rejected");
                self.status = Some(Status::Error(format!("Upload failed: {source}")));
                Err(IngestError::UploadFailed { source })
            }
        }
    }

    fn reject_submit(&mut self, err: IngestError) -> IngestError {
        warn!(error = %err, "submit refused");
        self.status = Some(Status::Error(err.to_string()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Period transport stub: either answers every path with a fixed
    /// payload, or fails every path.
    struct StubFetch {
        payload: Option<Value>,
    }

    impl PeriodFetch for StubFetch {
        async fn get_json(&self, path: &str) -> Result<Value> {
            match &self.payload {
                Some(v) => Ok(v.clone()),
                None => Err(anyhow!("unreachable endpoint {path}")),
            }
        }
    }

    /// Upload sink stub: counts calls, optionally fails, records the last
    /// envelope as JSON.
    #[derive(Default)]
    struct StubSink {
        calls: AtomicUsize,
        fail: bool,
        last: Mutex<Option<Value>>,
    }

    impl UploadSink for StubSink {
        async fn upload(&self, envelope: &UploadEnvelope) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(serde_json::to_value(envelope).unwrap());
            if self.fail {
                Err(anyhow!("500 from upload endpoint"))
            } else {
                Ok(())
            }
        }
    }

    fn session_with(
        payload: Option<Value>,
        fail_upload: bool,
    ) -> IngestSession<StubFetch, StubSink> {
        IngestSession::new(
            "CM-001",
            "Acme Pty Ltd",
            PeriodSource::new(StubFetch { payload }),
            StubSink {
                fail: fail_upload,
                ..StubSink::default()
            },
        )
    }

    fn june_2025() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    const CSV: &[u8] = b"SKU,Qty\nA,5\nB,7\n";

    #[tokio::test]
    async fn load_periods_normalizes_and_auto_selects() {
        let payload = json!({ "success": true, "years": [
            { "id": "10", "period": "July 2024 to June 2025" },
            { "id": "11", "period": "July 2025 to June 2026" },
        ]});
        let mut session = session_with(Some(payload), false);
        session.load_periods_at(june_2025()).await;

        assert_eq!(session.periods().len(), 2);
        assert_eq!(session.selection().from_period_id, "10");
        // "July 2024 to June 2025" is also the first label containing 2025.
        assert_eq!(session.selection().to_period_id, "10");
        assert!(session.status().is_none());
    }

    #[tokio::test]
    async fn endpoint_exhaustion_falls_back_to_default_periods() {
        let mut session = session_with(None, false);
        session.load_periods_at(june_2025()).await;

        let labels: Vec<&str> = session.periods().iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "July 2024 to June 2025",
                "July 2025 to June 2026",
                "July 2023 to June 2024",
            ]
        );
        // Both slots land on the first entry: its label spans 2024 and 2025.
        assert_eq!(session.selection().from_period_id, "1");
        assert_eq!(session.selection().to_period_id, "1");
        assert!(session.selection().is_complete());
    }

    #[tokio::test]
    async fn empty_payload_sets_error_status_but_does_not_fail() {
        let mut session = session_with(Some(json!({ "success": true })), false);
        session.load_periods_at(june_2025()).await;
        assert!(session.periods().is_empty());
        assert!(matches!(session.status(), Some(Status::Error(_))));
        assert_eq!(session.selection(), &PeriodSelection::default());
    }

    #[tokio::test]
    async fn select_file_holds_table_and_clears_prior_status() {
        let mut session = session_with(None, false);
        session.load_periods_at(june_2025()).await;

        session.select_file(CSV.to_vec(), "upload.csv").await.unwrap();
        assert_eq!(session.table().unwrap().row_count(), 2);
        assert_eq!(session.file_name(), Some("upload.csv"));
        assert!(session.status().is_none());
    }

    #[tokio::test]
    async fn rejected_replacement_clears_the_previous_table() {
        let mut session = session_with(None, false);
        session.select_file(CSV.to_vec(), "upload.csv").await.unwrap();
        assert!(session.table().is_some());

        let err = session
            .select_file(b"whatever".to_vec(), "upload.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType { .. }));
        // All-or-nothing per selection: no stale table survives.
        assert!(session.table().is_none());
        assert!(session.file_name().is_none());
        assert!(matches!(session.status(), Some(Status::Error(_))));
    }

    #[tokio::test]
    async fn clear_file_discards_table_and_messages() {
        let mut session = session_with(None, false);
        session.select_file(CSV.to_vec(), "upload.csv").await.unwrap();
        session.clear_file();
        assert!(session.table().is_none());
        assert!(session.file_name().is_none());
        assert!(session.status().is_none());
    }

    #[tokio::test]
    async fn submit_without_table_makes_no_network_call() {
        let mut session = session_with(None, false);
        session.load_periods_at(june_2025()).await;
        assert!(session.selection().is_complete());

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, IngestError::MissingSelection(_)));
        assert_eq!(session.sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_with_header_only_table_makes_no_network_call() {
        let mut session = session_with(None, false);
        session.load_periods_at(june_2025()).await;
        assert!(session.selection().is_complete());
        session
            .select_file(b"SKU,Qty\n".to_vec(), "upload.csv")
            .await
            .unwrap();
        assert_eq!(session.table().unwrap().row_count(), 0);

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, IngestError::MissingSelection(_)));
        assert_eq!(session.sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_without_periods_makes_no_network_call() {
        let mut session = session_with(None, false);
        session.select_file(CSV.to_vec(), "upload.csv").await.unwrap();

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, IngestError::MissingSelection(_)));
        assert_eq!(session.sink.calls.load(Ordering::SeqCst), 0);
        // The table survives a refused submit.
        assert!(session.table().is_some());
    }

    #[tokio::test]
    async fn successful_submit_uploads_envelope_and_clears_table() {
        let mut session = session_with(None, false);
        session.load_periods_at(june_2025()).await;
        session.select_file(CSV.to_vec(), "upload.csv").await.unwrap();

        session.submit().await.unwrap();

        assert_eq!(session.sink.calls.load(Ordering::SeqCst), 1);
        let envelope = session.sink.last.lock().unwrap().clone().unwrap();
        assert_eq!(envelope["sourceId"], "CM-001");
        assert_eq!(envelope["sourceLabel"], "Acme Pty Ltd");
        assert_eq!(envelope["fileName"], "upload.csv");
        assert_eq!(envelope["rowCount"], 2);
        assert_eq!(envelope["rows"][1]["SKU"], "B");

        assert!(session.table().is_none());
        assert!(session.file_name().is_none());
        assert!(matches!(session.status(), Some(Status::Success(_))));
        // Selection is retained for a follow-up upload.
        assert!(session.selection().is_complete());
    }

    #[tokio::test]
    async fn failed_submit_preserves_table_for_retry() {
        let mut session = session_with(None, true);
        session.load_periods_at(june_2025()).await;
        session.select_file(CSV.to_vec(), "upload.csv").await.unwrap();

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, IngestError::UploadFailed { .. }));
        assert_eq!(session.sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.table().unwrap().row_count(), 2);
        assert_eq!(session.file_name(), Some("upload.csv"));
        assert!(matches!(session.status(), Some(Status::Error(_))));
    }

    #[tokio::test]
    async fn manual_selection_overrides_defaults() {
        let mut session = session_with(None, false);
        session.load_periods_at(june_2025()).await;
        session.set_from_period("3");
        session.set_to_period("2");
        assert_eq!(session.selection().from_period_id, "3");
        assert_eq!(session.selection().to_period_id, "2");
    }
}
