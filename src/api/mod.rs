use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
};
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::RequestTier, gateway::Gateway};

mod error;
pub mod indexer;
pub mod types;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// The caller's tier. An authentication layer in front of the router can
/// insert a [`RequestTier`] request extension; without one every caller is
/// [`RequestTier::Standard`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Tier(pub RequestTier);

impl<S: Send + Sync> FromRequestParts<S> for Tier {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Tier(parts.extensions.get::<RequestTier>().copied().unwrap_or_default()))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        indexer::root,
        indexer::get_utxos,
        indexer::utxos_bulk,
        indexer::get_transaction_details,
        indexer::transaction_details_bulk,
        indexer::broadcast_transaction,
        indexer::get_block_headers,
        indexer::block_headers_bulk,
        indexer::get_balance,
        indexer::balance_bulk,
        indexer::get_transactions,
        indexer::transactions_bulk,
        indexer::get_mempool,
        indexer::mempool_bulk,
    ),
    components(
        schemas(
            crate::gateway::Balance,
            crate::gateway::Utxo,
            crate::gateway::MempoolEntry,
            crate::gateway::HistoryEntry,
            crate::gateway::HeaderRange,
            types::ErrorBody,
            types::AddressesRequest,
            types::TxidsRequest,
            types::BroadcastRequest,
            types::HeightsRequest,
        )
    ),
    tags(
        (name = "indexer-gateway", description = "Blockchain indexer gateway API"),
    )
)]
pub struct ApiDoc;

pub fn create_router(gateway: Arc<Gateway>, request_timeout: Duration) -> Router {
    let app_state = AppState { gateway };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()))
        .route("/", get(indexer::root))
        .route("/utxos/{address}", get(indexer::get_utxos))
        .route("/utxos", post(indexer::utxos_bulk))
        .route("/tx/data/{txid}", get(indexer::get_transaction_details))
        .route("/tx/data", post(indexer::transaction_details_bulk))
        .route("/tx/broadcast", post(indexer::broadcast_transaction))
        .route("/block/headers/{height}", get(indexer::get_block_headers))
        .route("/block/headers", post(indexer::block_headers_bulk))
        .route("/balance/{address}", get(indexer::get_balance))
        .route("/balance", post(indexer::balance_bulk))
        .route("/transactions/{address}", get(indexer::get_transactions))
        .route("/transactions", post(indexer::transactions_bulk))
        .route("/unconfirmed/{address}", get(indexer::get_mempool))
        .route("/unconfirmed", post(indexer::mempool_bulk))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(app_state)
}
