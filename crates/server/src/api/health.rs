//! Health check endpoint.

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

/// Liveness probe. Does not touch the database or the mail relay.
#[tracing::instrument()]
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = MISC_TAG,
    operation_id = "Health Check",
    summary = "Service health check",
    description = "Returns `ok` while the alerts service is accepting requests. \
                   Answers GET and HEAD so it can back load balancer probes.",
    responses(
        (status = 200, description = "Service is up", body = str, content_type = "text/plain", example = "ok")
    )
)]
pub async fn health() -> &'static str {
    "ok"
}
