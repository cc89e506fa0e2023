use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{error, warn};
use serde_json::json;

use crate::error::{ErrorCategory, GatewayError, classify};

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let classified = classify(&self);
        let status = StatusCode::from_u16(classified.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(
                category:? = classified.category,
                status = classified.http_status,
                error:% = self;
                "Request failed"
            );
        } else {
            warn!(
                category:? = classified.category,
                status = classified.http_status,
                error = &*classified.message;
                "Request rejected"
            );
        }

        let body = match classified.category {
            ErrorCategory::ArraySizeError => Json(json!({ "error": classified.message })),
            _ => Json(json!({
                "success": false,
                "error": classified.message,
            })),
        };

        (status, body).into_response()
    }
}
