//! Commentary tag substitution.
//!
//! Replaces `{team:ID}` and `{problem:ID}` placeholders with display names
//! using the contest info in effect when the message is applied.

use std::sync::Arc;

use tracing::warn;

use crate::adapters::AdapterStage;
use crate::model::contest::ContestInfo;
use crate::update::ContestUpdate;

/// Rewrites commentary entity tags into display names.
pub struct CommentaryTagsStage {
    info: Option<Arc<ContestInfo>>,
}

impl CommentaryTagsStage {
    /// Stage with no contest known yet.
    pub fn new() -> Self {
        Self { info: None }
    }
}

impl Default for CommentaryTagsStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for CommentaryTagsStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        match update {
            ContestUpdate::Info(info) => {
                self.info = Some(Arc::clone(&info));
                vec![ContestUpdate::Info(info)]
            }
            ContestUpdate::Commentary(mut msg) => {
                if let Some(info) = self.info.as_deref() {
                    msg.message = substitute_tags(&msg.message, info);
                }
                vec![ContestUpdate::Commentary(msg)]
            }
            other @ ContestUpdate::Run(_) => vec![other],
        }
    }
}

/// Replaces every `{kind:id}` tag whose entity resolves; unresolved tags are
/// kept verbatim.
fn substitute_tags(text: &str, info: &ContestInfo) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        let tag = &tail[1..close];
        let replaced = match tag.split_once(':') {
            Some(("team", id)) => info.find_team(id).map(|t| t.display_name.clone()),
            Some(("problem", id)) => info.find_problem(id).map(|p| p.label.clone()),
            _ => None,
        };
        match replaced {
            Some(name) => out.push_str(&name),
            None => {
                if tag.starts_with("team:") || tag.starts_with("problem:") {
                    warn!(tag = %tag, "commentary tag references unknown entity");
                }
                out.push_str(&tail[..=close]);
            }
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}
