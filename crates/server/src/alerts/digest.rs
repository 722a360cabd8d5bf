//! Per-Hansard digest run, triggered by an external scheduler once a
//! transcript has been imported.

use crate::AppResources;
use crate::alerts::email::{DispatchSummary, NotificationSender};
use crate::alerts::matcher::match_statements;
use crate::entity::{hansard, politician, politician_alert, statement};
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Hansard {0} not found")]
    HansardNotFound(i32),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Sends one digest per legacy alert whose politician spoke in `hansard_id`.
///
/// Only loading can fail; delivery problems are reported in the summary.
#[tracing::instrument(skip(resources))]
pub async fn notify_hansard(
    resources: &AppResources,
    hansard_id: i32,
) -> Result<DispatchSummary, DigestError> {
    let db = resources.db.as_ref();
    let hansard = hansard::Entity::find_by_id(hansard_id)
        .one(db)
        .await?
        .ok_or(DigestError::HansardNotFound(hansard_id))?;

    let alerts = politician_alert::Entity::find()
        .find_also_related(politician::Entity)
        .order_by_asc(politician_alert::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(alert, politician)| match politician {
            Some(p) => Some((alert, p)),
            None => {
                tracing::warn!(
                    name = "alerts.notify_hansard.orphaned_alert",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    alert_id = alert.id,
                    politician_id = alert.politician_id,
                    message = "Skipping alert for unknown politician"
                );
                None
            }
        })
        .collect::<Vec<_>>();

    let statements = statement::Entity::find()
        .filter(statement::Column::HansardId.eq(hansard.id))
        .order_by_asc(statement::Column::Sequence)
        .order_by_asc(statement::Column::Id)
        .all(db)
        .await?;

    let jobs = match_statements(alerts, &statements);
    tracing::info!(
        hansard_id = hansard.id,
        statements = statements.len(),
        digests = jobs.len(),
        "Matched Hansard against politician alerts"
    );

    let summary = NotificationSender::from_resources(resources)
        .dispatch(&jobs, &hansard)
        .await;
    tracing::info!(
        sent = summary.sent,
        sandboxed = summary.sandboxed,
        failed = summary.failed,
        "Finished Hansard digest run"
    );
    Ok(summary)
}
