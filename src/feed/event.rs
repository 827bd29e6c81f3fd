//! Raw feed event framing.

use serde::Deserialize;
use serde_json::Value;

/// Entity type carried by a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Contest metadata.
    Contest,
    /// Contest lifecycle state.
    State,
    /// Judgement type table.
    JudgementTypes,
    /// Language table.
    Languages,
    /// Group table.
    Groups,
    /// Organization table.
    Organizations,
    /// Team table.
    Teams,
    /// Problem table.
    Problems,
    /// Account table; parsed and ignored.
    Accounts,
    /// Person table; parsed and ignored.
    Persons,
    /// Submissions.
    Submissions,
    /// Judgements over submissions.
    Judgements,
    /// Per-test-case runs within a judgement.
    Runs,
    /// Commentary messages.
    Commentary,
    /// Clarifications; parsed and ignored.
    Clarifications,
    /// Awards; parsed and ignored.
    Awards,
    /// Anything this model does not understand.
    Unknown,
}

impl EventKind {
    /// Maps a wire `type` value, handling the `batch-` prefix.
    pub fn from_type(event_type: &str) -> (Self, bool) {
        let (name, batch) = match event_type.strip_prefix("batch-") {
            Some(rest) => (rest, true),
            None => (event_type, false),
        };
        let kind = match name {
            "contest" | "contests" => EventKind::Contest,
            "state" => EventKind::State,
            "judgement-types" => EventKind::JudgementTypes,
            "languages" => EventKind::Languages,
            "groups" => EventKind::Groups,
            "organizations" => EventKind::Organizations,
            "teams" => EventKind::Teams,
            "problems" => EventKind::Problems,
            "accounts" => EventKind::Accounts,
            "persons" => EventKind::Persons,
            "submissions" => EventKind::Submissions,
            "judgements" => EventKind::Judgements,
            "runs" => EventKind::Runs,
            "commentary" => EventKind::Commentary,
            "clarifications" => EventKind::Clarifications,
            "awards" => EventKind::Awards,
            _ => EventKind::Unknown,
        };
        (kind, batch)
    }

    /// Fixed priority used by the startup reorder: info-affecting types sort
    /// ahead of run-affecting types.
    pub fn priority(self) -> u8 {
        match self {
            EventKind::Contest => 0,
            EventKind::State => 1,
            EventKind::JudgementTypes => 2,
            EventKind::Languages => 3,
            EventKind::Groups => 4,
            EventKind::Organizations => 5,
            EventKind::Teams => 6,
            EventKind::Problems => 7,
            EventKind::Accounts => 8,
            EventKind::Persons => 9,
            EventKind::Submissions => 10,
            EventKind::Judgements => 11,
            EventKind::Runs => 12,
            EventKind::Commentary => 13,
            EventKind::Clarifications => 14,
            EventKind::Awards => 15,
            EventKind::Unknown => 16,
        }
    }

    /// True for event types that rebuild the contest info snapshot.
    pub fn affects_info(self) -> bool {
        matches!(
            self,
            EventKind::Contest
                | EventKind::State
                | EventKind::JudgementTypes
                | EventKind::Languages
                | EventKind::Groups
                | EventKind::Organizations
                | EventKind::Teams
                | EventKind::Problems
        )
    }
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    token: Option<String>,
}

/// One parsed feed line, not yet normalized.
#[derive(Debug, Clone)]
pub struct RawFeedEvent {
    /// Entity type.
    pub kind: EventKind,
    /// True when `data` is a whole-table batch.
    pub batch: bool,
    /// Event-level entity id.
    pub id: Option<String>,
    /// Payload; `None` records a removal.
    pub data: Option<Value>,
    /// Feed resumption token used for outage deduplication.
    pub token: Option<String>,
}

impl RawFeedEvent {
    /// Parses one newline-delimited JSON feed line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let wire: WireEvent = serde_json::from_str(line)?;
        let (kind, mut batch) = EventKind::from_type(&wire.event_type);
        let data = match wire.op.as_deref() {
            Some("delete") => None,
            _ => wire.data.filter(|v| !v.is_null()),
        };
        if matches!(data, Some(Value::Array(_))) {
            batch = true;
        }
        Ok(Self {
            kind,
            batch,
            id: wire.id,
            data,
            token: wire.token,
        })
    }

    /// True for the end-of-updates sentinel that marks archival finalization.
    pub fn is_completion_sentinel(&self) -> bool {
        self.kind == EventKind::State
            && self
                .data
                .as_ref()
                .and_then(|d| d.get("end_of_updates"))
                .is_some_and(|v| !v.is_null())
    }
}
