//! Migration progress reporting.
//!
//! Progress goes to **stderr** so stdout stays reserved for the run summary
//! and the `convert`/`inspect` output. Each event renders itself either as a
//! human line or as a JSON object; [`StderrProgress`] only picks the format.

use std::io::Write;
use std::str::FromStr;

/// Pipeline stage. Stages always run in this order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Authors,
    Categories,
    Tags,
    Attachments,
    Posts,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Authors => "authors",
            Stage::Categories => "categories",
            Stage::Tags => "tags",
            Stage::Attachments => "attachments",
            Stage::Posts => "posts",
        }
    }
}

#[derive(Clone, Debug)]
pub enum MigrationProgressEvent {
    /// A stage started; `total` is the number of entities it will handle.
    StageStarted { stage: Stage, total: u64 },
    /// Post `n` of `total` is being migrated.
    Post { n: u64, total: u64, title: String },
}

impl MigrationProgressEvent {
    /// `[tags] 12 to write` or `[posts 3/40] Hello`.
    pub fn human_line(&self) -> String {
        match self {
            MigrationProgressEvent::StageStarted { stage, total } => {
                format!("[{}] {} to write", stage.as_str(), total)
            }
            MigrationProgressEvent::Post { n, total, title } => {
                let width = total.to_string().len();
                format!("[posts {:>width$}/{}] {}", n, total, title, width = width)
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MigrationProgressEvent::StageStarted { stage, total } => serde_json::json!({
                "event": "stage",
                "stage": stage.as_str(),
                "total": total,
            }),
            MigrationProgressEvent::Post { n, total, title } => serde_json::json!({
                "event": "post",
                "stage": Stage::Posts.as_str(),
                "n": n,
                "total": total,
                "title": title,
            }),
        }
    }
}

pub trait MigrationProgressReporter: Send + Sync {
    fn report(&self, event: MigrationProgressEvent);
}

/// One line per event on stderr.
pub struct StderrProgress {
    json: bool,
}

impl StderrProgress {
    pub fn human() -> Self {
        Self { json: false }
    }

    pub fn json() -> Self {
        Self { json: true }
    }
}

impl MigrationProgressReporter for StderrProgress {
    fn report(&self, event: MigrationProgressEvent) {
        let line = if self.json {
            event.to_json().to_string()
        } else {
            event.human_line()
        };
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
    }
}

pub struct NoProgress;

impl MigrationProgressReporter for NoProgress {
    fn report(&self, _event: MigrationProgressEvent) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

/// Reporter for `--progress`. Without the flag, human progress is shown only
/// when stderr is a terminal.
pub fn progress_reporter(requested: Option<ProgressMode>) -> Box<dyn MigrationProgressReporter> {
    let mode = requested.unwrap_or(if atty::is(atty::Stream::Stderr) {
        ProgressMode::Human
    } else {
        ProgressMode::Off
    });
    match mode {
        ProgressMode::Off => Box::new(NoProgress),
        ProgressMode::Human => Box::new(StderrProgress::human()),
        ProgressMode::Json => Box::new(StderrProgress::json()),
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}' (expected human, json or off)",
                other
            )),
        }
    }
}
