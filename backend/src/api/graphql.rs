//! GraphQL HTTP and WebSocket endpoints
//!
//! The current user is resolved once per HTTP request, and once per
//! WebSocket connection.

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::header::{ACCEPT, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::graphql::{CurrentUser, user_data};
use crate::services::bearer_token;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/graphql/ws", get(graphql_ws_handler))
}

/// Raw `Authorization` header value, if it is valid UTF-8
fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok())
}

/// Token from a `connection_init` payload, normalised to header form.
/// Clients send either `Bearer <token>` or the bare token.
fn init_authorization(params: &serde_json::Value) -> Option<String> {
    let value = params
        .get("Authorization")
        .or_else(|| params.get("authorization"))
        .and_then(|v| v.as_str())?;

    if bearer_token(value).is_some() {
        Some(value.to_string())
    } else {
        Some(format!("Bearer {}", value))
    }
}

/// GraphQL query/mutation handler with auth context
async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();

    if let Some(user) = state.auth.resolve_current_user(authorization(&headers)).await {
        request = request.data(CurrentUser(user));
    }

    state.schema.execute(request).await.into()
}

/// GraphiQL interactive playground (only for browsers)
async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        Html(
            GraphiQLSource::build()
                .endpoint("/graphql")
                .subscription_endpoint("/graphql/ws")
                .finish(),
        )
        .into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

/// GraphQL WebSocket handler for subscriptions with auth
async fn graphql_ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    protocol: GraphQLProtocol,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let header_user = state.auth.resolve_current_user(authorization(&headers)).await;
    let auth = state.auth.clone();

    ws.protocols(["graphql-transport-ws", "graphql-ws"])
        .on_upgrade(move |socket| {
            GraphQLWebSocket::new(socket, state.schema.clone(), protocol)
                // A token in the init payload takes precedence over the upgrade header
                .on_connection_init(move |params| async move {
                    let user = match init_authorization(&params) {
                        Some(header) => auth.resolve_current_user(Some(&header)).await,
                        None => header_user,
                    };
                    Ok(user_data(user))
                })
                .serve()
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_init_authorization_accepts_both_forms() {
        assert_eq!(
            init_authorization(&json!({ "Authorization": "Bearer abc" })).as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(
            init_authorization(&json!({ "authorization": "abc" })).as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(init_authorization(&json!({})), None);
        assert_eq!(init_authorization(&json!({ "Authorization": 42 })), None);
    }
}
