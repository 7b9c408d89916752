#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Value};

use fieldops_api::app;
use fieldops_api::auth::{password::hash_password, Role, SubjectId, TokenCodec};
use fieldops_api::config::AppConfig;
use fieldops_api::state::AppState;
use fieldops_api::store::MemoryStore;

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct horse battery staple";

pub const ADMIN: SubjectId = 1;
pub const SUPERVISOR: SubjectId = 2;
pub const TECHNICIAN: SubjectId = 3;
pub const OTHER_TECHNICIAN: SubjectId = 4;

/// Hashing is slow in debug builds, so every server shares one hash.
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).expect("hash test password"))
}

/// One in-process server per test, each with its own seeded store.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub tokens: Arc<TokenCodec>,
    client: reqwest::Client,
}

impl TestServer {
    async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::in_memory(SECRET);
        config.port = port;
        config.auth.token_leeway_secs = 0;
        config.auth.role_lookup_timeout_ms = 500;

        let store = Arc::new(MemoryStore::new());
        seed(&store).await;

        let state = AppState::new(config, store.clone());
        let tokens = state.tokens.clone();
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test server")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app::router(state)).await;
        });

        Ok(Self { port, base_url, store, tokens, client: reqwest::Client::new() })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Token for `subject` without a role hint.
    pub fn token(&self, subject: SubjectId) -> String {
        self.tokens.issue(subject, None).expect("issue test token")
    }

    pub fn token_with_hint(&self, subject: SubjectId, hint: Role) -> String {
        self.tokens.issue(subject, Some(hint)).expect("issue test token")
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    pub fn get_as(&self, subject: SubjectId, path: &str) -> RequestBuilder {
        self.get(path).bearer_auth(self.token(subject))
    }

    pub fn post_as(&self, subject: SubjectId, path: &str, body: Value) -> RequestBuilder {
        self.post(path).bearer_auth(self.token(subject)).json(&body)
    }

    pub fn put_as(&self, subject: SubjectId, path: &str, body: Value) -> RequestBuilder {
        self.put(path).bearer_auth(self.token(subject)).json(&body)
    }

    pub fn delete_as(&self, subject: SubjectId, path: &str) -> RequestBuilder {
        self.delete(path).bearer_auth(self.token(subject))
    }
}

pub async fn ensure_server() -> Result<TestServer> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let server = TestServer::spawn().await?;
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

async fn seed(store: &MemoryStore) {
    let hash = password_hash();
    store
        .seed(
            "usuario",
            vec![
                json!({"id": ADMIN, "nombre": "Ana Admin", "correo": "admin@fieldops.test", "telefono": "555-0001", "rol": "Administrador", "password": hash}),
                json!({"id": SUPERVISOR, "nombre": "Sergio Supervisor", "correo": "supervisor@fieldops.test", "telefono": "555-0002", "rol": "Supervisor", "password": hash}),
                json!({"id": TECHNICIAN, "nombre": "Tomás Técnico", "correo": "tecnico@fieldops.test", "telefono": "555-0003", "rol": "Técnico", "password": hash}),
                json!({"id": OTHER_TECHNICIAN, "nombre": "Teresa Técnica", "correo": "tecnica@fieldops.test", "telefono": "555-0004", "rol": "Técnico", "password": hash}),
            ],
        )
        .await;
    store
        .seed(
            "cliente",
            vec![json!({
                "id": 1,
                "nombre": "Acme Ltda",
                "correo": "contacto@acme.test",
                "telefono": "555-1000",
                "direccion": "Av. Central 100",
                "ubicacion": "{\"lat\":-33.45,\"lng\":-70.66}",
                "fecha_registro": "2024-01-10T12:00:00+00:00",
            })],
        )
        .await;
    store
        .seed("grupo", vec![json!({"id": 1, "nombre": "Norte", "descripcion": "Zona norte", "id_supervisor": SUPERVISOR})])
        .await;
    store
        .seed("grupo_tecnico", vec![json!({"id": 1, "id_grupo": 1, "id_tecnico": TECHNICIAN})])
        .await;
    store
        .seed(
            "visita",
            vec![
                json!({"id": 1, "id_cliente": 1, "id_tecnico": TECHNICIAN, "id_supervisor": SUPERVISOR, "fecha": "2024-02-01", "estado": "Pendiente"}),
                json!({"id": 2, "id_cliente": 1, "id_tecnico": OTHER_TECHNICIAN, "id_supervisor": SUPERVISOR, "fecha": "2024-02-02", "estado": "Pendiente"}),
            ],
        )
        .await;
    store
        .seed(
            "reporte",
            vec![
                json!({"id": 1, "id_visita": 1, "id_tecnico": TECHNICIAN, "id_supervisor": SUPERVISOR, "horaInicio": "2024-02-01T09:00:00", "horaFin": "2024-02-01T10:00:00", "descripcion": "Cambio de filtro", "estado": "Pendiente", "evidencia": null}),
                json!({"id": 2, "id_visita": 2, "id_tecnico": OTHER_TECHNICIAN, "id_supervisor": SUPERVISOR, "horaInicio": "2024-02-02T09:00:00", "horaFin": "2024-02-02T11:00:00", "descripcion": "Revisión general", "estado": "Pendiente", "evidencia": null}),
            ],
        )
        .await;
}
