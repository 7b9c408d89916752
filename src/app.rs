use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{ADMIN_ONLY, SUPERVISOR_OR_ABOVE, TECHNICIAN_ONLY, TECHNICIAN_OR_ABOVE};
use crate::handlers::{clients, groups, login, reports, settings, users, visits};
use crate::middleware::{authenticate, gated};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(user_routes())
        .merge(client_routes())
        .merge(group_routes())
        .merge(visit_routes())
        .merge(report_routes())
        .merge(settings_routes())
        .route_layer(from_fn_with_state(state.verifier.clone(), authenticate));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/login", post(login::login))
        // Everything else passes the token verifier first
        .merge(protected)
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let security = &state.config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

fn user_routes() -> Router<AppState> {
    let crud = || {
        (
            gated(ADMIN_ONLY, get(users::list).post(users::create)),
            gated(ADMIN_ONLY, get(users::show).put(users::update).delete(users::remove)),
        )
    };
    let (api_collection, api_member) = crud();
    let (collection, member) = crud();

    Router::new()
        .route("/api/usuarios", api_collection)
        .route("/api/usuarios/:id", api_member)
        .route("/usuarios", collection)
        .route("/usuarios/:id", member)
        .route("/usuarios/tecnicos-disponibles", gated(TECHNICIAN_OR_ABOVE, get(users::available_technicians)))
}

fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/clientes", gated(SUPERVISOR_OR_ABOVE, get(clients::list).post(clients::create)))
        .route(
            "/clientes/:id",
            gated(SUPERVISOR_OR_ABOVE, get(clients::show).put(clients::update).delete(clients::remove)),
        )
}

fn group_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/grupos",
            gated(SUPERVISOR_OR_ABOVE, get(groups::list)).merge(gated(ADMIN_ONLY, post(groups::create))),
        )
        .route(
            "/grupos/:id",
            gated(TECHNICIAN_OR_ABOVE, get(groups::show))
                .merge(gated(ADMIN_ONLY, put(groups::update).delete(groups::remove))),
        )
        .route("/grupos/tecnico/:id_tecnico", gated(TECHNICIAN_OR_ABOVE, get(groups::for_technician)))
        .route("/grupos/:id/asignar-tecnico", gated(ADMIN_ONLY, post(groups::assign_technician)))
        .route("/grupos/:id/tecnicos", gated(SUPERVISOR_OR_ABOVE, get(groups::members)))
        .route(
            "/grupos/:id/tecnicos-disponibles",
            gated(TECHNICIAN_OR_ABOVE, get(groups::available_technicians)),
        )
        .route(
            "/grupos/:id/quitar-tecnico/:id_tecnico",
            gated(ADMIN_ONLY, delete(groups::remove_technician)),
        )
        .route(
            "/grupos/supervisor/:id_supervisor/tecnicos",
            gated(TECHNICIAN_OR_ABOVE, get(groups::supervisor_technicians)),
        )
}

fn visit_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/visitas",
            gated(SUPERVISOR_OR_ABOVE, get(visits::list).post(visits::create)),
        )
        .route(
            "/visitas/:id",
            gated(TECHNICIAN_OR_ABOVE, get(visits::show))
                .merge(gated(SUPERVISOR_OR_ABOVE, put(visits::update)))
                .merge(gated(ADMIN_ONLY, delete(visits::remove))),
        )
        .route("/visitas/tecnico/:id_tecnico", gated(TECHNICIAN_OR_ABOVE, get(visits::for_technician)))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/reportes",
            gated(SUPERVISOR_OR_ABOVE, get(reports::list)).merge(gated(TECHNICIAN_ONLY, post(reports::create))),
        )
        .route(
            "/reportes/:id",
            gated(TECHNICIAN_OR_ABOVE, get(reports::show).put(reports::update))
                .merge(gated(ADMIN_ONLY, delete(reports::remove))),
        )
        .route("/reportes/tecnico/:id", gated(TECHNICIAN_OR_ABOVE, get(reports::for_technician)))
        .route(
            "/reportes/supervisor/:id_supervisor/reportes",
            gated(TECHNICIAN_OR_ABOVE, get(reports::for_supervisor)),
        )
}

fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/configuracion", gated(ADMIN_ONLY, get(settings::show)))
        .route("/configuracion/cambiar-rol", gated(ADMIN_ONLY, put(settings::change_role)))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "FieldOps API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Field-service management backend: users, clients, technician groups, visits and reports",
        "endpoints": {
            "login": "POST /api/login (public)",
            "users": "/api/usuarios[/:id] (administrators)",
            "clients": "/clientes[/:id] (supervisors and above)",
            "groups": "/grupos[/:id] (role depends on operation)",
            "visits": "/visitas[/:id] (role depends on operation)",
            "reports": "/reportes[/:id] (role depends on operation)",
            "settings": "/configuracion (administrators)",
            "health": "/health (public)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": state.store.backend(),
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "store": state.store.backend(),
                    "error": "store unavailable",
                })),
            )
        }
    }
}
