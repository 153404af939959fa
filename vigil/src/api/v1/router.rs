use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::v1_auth_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    let searches = Router::new()
        .route(
            "/",
            get(handlers::searches::list_searches).post(handlers::searches::create_search),
        )
        .route(
            "/{searchId}",
            get(handlers::searches::get_search)
                .patch(handlers::searches::update_search)
                .delete(handlers::searches::delete_search),
        )
        .route("/{searchId}/trigger", post(handlers::searches::trigger_search))
        .route("/{searchId}/cancel", post(handlers::searches::cancel_search))
        .route("/{searchId}/events", get(handlers::events::search_events))
        .route(
            "/{searchId}/rules",
            get(handlers::rules::list_rules).post(handlers::rules::create_rule),
        );

    let alerts = Router::new()
        .route("/", get(handlers::alerts::list_alerts))
        .route(
            "/{alertId}",
            get(handlers::alerts::get_alert).patch(handlers::alerts::update_alert),
        )
        .route("/{alertId}/feedback", post(handlers::alerts::submit_feedback));

    let rules = Router::new().route("/{ruleId}", delete(handlers::rules::delete_rule));

    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let protected_routes = Router::new()
        .nest("/searches", searches)
        .nest("/alerts", alerts)
        .nest("/rules", rules)
        .route_layer(middleware::from_fn_with_state(state, v1_auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
