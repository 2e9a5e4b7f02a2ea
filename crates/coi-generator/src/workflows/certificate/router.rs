use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use super::domain::CoiRequested;
use super::load::{CertificateRenderer, Mailer};
use super::pipeline::{CoiGenerator, GenerationReport};
use super::store::DocumentStore;
use crate::error::AppError;

/// Router exposing certificate generation over HTTP.
pub fn coi_router<S, R, M>(generator: Arc<CoiGenerator<S, R, M>>) -> Router
where
    S: DocumentStore + ?Sized + 'static,
    R: CertificateRenderer + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route("/api/v1/coi/requests", post(request_handler::<S, R, M>))
        .with_state(generator)
}

pub(crate) async fn request_handler<S, R, M>(
    State(generator): State<Arc<CoiGenerator<S, R, M>>>,
    Json(request): Json<CoiRequested>,
) -> Result<Json<GenerationReport>, AppError>
where
    S: DocumentStore + ?Sized + 'static,
    R: CertificateRenderer + 'static,
    M: Mailer + 'static,
{
    info!(
        policy_foxden_id = %request.policy_foxden_id,
        geography = %request.geography,
        "certificate requested"
    );
    let report = generator.generate(&request).await?;
    Ok(Json(report))
}
