use serde::{Deserialize, Serialize};

// ─── Wire model ──────────────────────────────────────────────────

/// One telemetry record per completed request.
/// This is the "write" side; the interceptor builds these and the batcher
/// ships them verbatim.
///
/// Field names on the wire are fixed by the collector's ingest contract
/// (`apiToken`, `userId`, `responseTime`, ...), hence the camelCase rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    /// Tenant credential, forwarded verbatim and never validated locally.
    pub api_token: String,
    /// Account the record is attributed to on the collector side.
    pub user_id: String,
    /// Matched route template when the router provides one ("/api/users/:id"),
    /// raw path otherwise.
    pub route: String,
    /// HTTP verb.
    pub method: String,
    /// Wall-clock milliseconds from request start to response finish.
    pub response_time: u64,
    /// Final status code, observed once the response was produced.
    pub status_code: u16,
}

/// The envelope a collector receives: `{"logs": [...]}`.
///
/// Owned variant for the receiving side (sinks, tests); the batcher itself
/// serializes a borrowed slice so a failed attempt never clones the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatch {
    pub logs: Vec<MetricRecord>,
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetricRecord {
        MetricRecord {
            api_token: "tok-1".into(),
            user_id: "acct-1".into(),
            route: "/api/users/:id".into(),
            method: "GET".into(),
            response_time: 42,
            status_code: 200,
        }
    }

    #[test]
    fn serializes_with_the_collector_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "apiToken":     "tok-1",
                "userId":       "acct-1",
                "route":        "/api/users/:id",
                "method":       "GET",
                "responseTime": 42,
                "statusCode":   200,
            })
        );
    }

    #[test]
    fn batch_envelope_wraps_records_under_logs() {
        let batch = LogBatch { logs: vec![sample(), sample()] };
        let json = serde_json::to_value(&batch).unwrap();

        assert_eq!(json["logs"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["logs"][0]["apiToken"], "tok-1");

        let parsed: LogBatch = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.logs, batch.logs);
    }
}
