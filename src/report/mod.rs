use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DeviceError;

/// What happened to one switch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    /// No peers to add, no session opened
    Skipped,
    Failed { kind: String, message: String },
}

impl From<&DeviceError> for Outcome {
    fn from(e: &DeviceError) -> Self {
        Outcome::Failed {
            kind: e.kind().to_string(),
            message: e.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HostResult {
    pub host: String,
    pub peers: Vec<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl HostResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Per-host results of a run, in plan order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<HostResult>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome == Outcome::Ok).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.outcome == Outcome::Skipped).count()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for r in &self.results {
            let line = match &r.outcome {
                Outcome::Ok => format!("{}: ok ({} peers)", r.host, r.peers.len()),
                Outcome::Skipped => format!("{}: skipped (no peers)", r.host),
                Outcome::Failed { kind, message } => format!("{}: FAILED [{}] {}", r.host, kind, message),
            };
            out.push_str(&line);
            out.push('\n');
        }
        let elapsed = self.finished_at - self.started_at;
        out.push_str(&format!(
            "{} succeeded, {} failed, {} skipped in {:.1}s\n",
            self.succeeded(),
            self.failed(),
            self.skipped(),
            elapsed.num_milliseconds() as f64 / 1000.0
        ));
        out
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        let now = Utc::now();
        RunReport {
            started_at: now,
            finished_at: now,
            results: vec![
                HostResult { host: "leaf1".into(), peers: vec!["10.0.0.2".into()], outcome: Outcome::Ok },
                HostResult {
                    host: "leaf2".into(),
                    peers: vec!["10.0.0.1".into()],
                    outcome: (&DeviceError::Connection("TCP connection failed".into())).into(),
                },
                HostResult { host: "solo".into(), peers: vec![], outcome: Outcome::Skipped },
            ],
        }
    }

    #[test]
    fn test_counts() {
        let r = report();
        assert_eq!(r.succeeded(), 1);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.skipped(), 1);
    }

    #[test]
    fn test_render_text() {
        let text = report().render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "leaf1: ok (1 peers)");
        assert_eq!(lines[1], "leaf2: FAILED [connection] TCP connection failed");
        assert_eq!(lines[2], "solo: skipped (no peers)");
        assert!(lines[3].starts_with("1 succeeded, 1 failed, 1 skipped"));
    }

    #[test]
    fn test_render_json() {
        let value: serde_json::Value = serde_json::from_str(&report().render_json().unwrap()).unwrap();
        assert_eq!(value["results"][0]["status"], "ok");
        assert_eq!(value["results"][1]["status"], "failed");
        assert_eq!(value["results"][1]["kind"], "connection");
        assert_eq!(value["results"][2]["status"], "skipped");
    }
}
