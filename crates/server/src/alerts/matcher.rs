//! Matches a Hansard's statements against legacy politician alerts.

use crate::entity::{politician, politician_alert, statement};
use std::collections::{HashMap, HashSet};

/// Everything needed to send one digest email.
#[derive(Clone, Debug, PartialEq)]
pub struct DigestJob {
    pub alert: politician_alert::Model,
    pub politician: politician::Model,
    /// Matched statements, in transcript order. Never empty.
    pub statements: Vec<statement::Model>,
    /// Topic of every matched statement in transcript order, repeats included.
    pub topics: Vec<String>,
}

#[derive(Default)]
struct Matched {
    statements: Vec<statement::Model>,
    topics: Vec<String>,
}

/// Groups `statements` (already in transcript order) by speaker and emits one
/// job per alert whose politician spoke at least once. Several alerts for the
/// same politician each get their own job.
pub fn match_statements(
    alerts: Vec<(politician_alert::Model, politician::Model)>,
    statements: &[statement::Model],
) -> Vec<DigestJob> {
    let watched: HashSet<i32> = alerts.iter().map(|(a, _)| a.politician_id).collect();

    let mut by_politician: HashMap<i32, Matched> = HashMap::new();
    for statement in statements {
        let Some(pol_id) = statement.politician_id else {
            continue;
        };
        if !watched.contains(&pol_id) {
            continue;
        }
        let entry = by_politician.entry(pol_id).or_default();
        entry.statements.push(statement.clone());
        entry.topics.push(statement.topic.clone());
    }

    alerts
        .into_iter()
        .filter_map(|(alert, politician)| {
            let matched = by_politician.get(&alert.politician_id)?;
            if matched.statements.is_empty() {
                return None;
            }
            Some(DigestJob {
                statements: matched.statements.clone(),
                topics: matched.topics.clone(),
                alert,
                politician,
            })
        })
        .collect()
}
