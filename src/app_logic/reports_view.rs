/*
 * View model for the reports view: decodes the `/api/reports` payload and picks
 * the dataset the chart shows.
 */
use crate::core::{AppState, FetchError, ReportEntry, placeholder_reports};

pub fn decode_reports(payload: serde_json::Value) -> Result<Vec<ReportEntry>, FetchError> {
    serde_json::from_value(payload).map_err(|e| FetchError::Decode(e.to_string()))
}

// Fetched reports when the state holds them, otherwise the placeholder dataset.
pub fn chart_entries(state: &AppState) -> Vec<ReportEntry> {
    match &state.reports {
        Some(reports) => reports.clone(),
        None => placeholder_reports(),
    }
}
