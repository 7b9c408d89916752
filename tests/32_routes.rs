mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{ADMIN, OTHER_TECHNICIAN, SUPERVISOR, TECHNICIAN};

fn ids(rows: &[Value], column: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = rows.iter().filter_map(|r| r[column].as_i64()).collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn user_management_is_admin_only_on_both_mounts() -> Result<()> {
    let server = common::ensure_server().await?;

    for path in ["/api/usuarios", "/usuarios", "/api/usuarios/3", "/usuarios/3"] {
        assert_eq!(server.get_as(SUPERVISOR, path).send().await?.status(), StatusCode::FORBIDDEN, "{path}");
        assert_eq!(server.get_as(TECHNICIAN, path).send().await?.status(), StatusCode::FORBIDDEN, "{path}");
        assert_eq!(server.get_as(ADMIN, path).send().await?.status(), StatusCode::OK, "{path}");
    }

    let res = server.get_as(ADMIN, "/api/usuarios/99").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn creating_users_hashes_passwords_and_rejects_duplicates() -> Result<()> {
    let server = common::ensure_server().await?;
    let body = json!({
        "nombre": "Nuevo Técnico",
        "correo": "nuevo@fieldops.test",
        "telefono": "555-0005",
        "password": "s3cret-pass",
    });

    let res = server.post_as(ADMIN, "/api/usuarios", body.clone()).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = res.json::<Value>().await?;
    assert_eq!(created["data"][0]["rol"], "Técnico");
    assert!(created["data"][0].get("password").is_none());

    let stored = server.store.rows("usuario").await;
    let row = stored.iter().find(|r| r.get("correo") == Some(&json!("nuevo@fieldops.test"))).expect("user stored");
    assert!(row.get("password").and_then(Value::as_str).unwrap_or_default().starts_with("$argon2"));

    let res = server.post_as(ADMIN, "/api/usuarios", body).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server
        .post_as(ADMIN, "/api/usuarios", json!({"nombre": "X", "correo": "x@fieldops.test", "telefono": "1", "password": "p", "rol": "Gerente"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn clients_are_for_supervisors_and_above() -> Result<()> {
    let server = common::ensure_server().await?;

    assert_eq!(server.get_as(TECHNICIAN, "/clientes").send().await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.get_as(ADMIN, "/clientes").send().await?.status(), StatusCode::OK);

    let res = server.get_as(SUPERVISOR, "/clientes?nombre=acme").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Vec<Value>>().await?.len(), 1);

    let res = server.get_as(SUPERVISOR, "/clientes?fecha_registro=2025-01-01").send().await?;
    assert_eq!(res.json::<Vec<Value>>().await?.len(), 0);

    let res = server
        .post_as(SUPERVISOR, "/clientes", json!({"nombre": "Sin mapa", "correo": "sm@test"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .post_as(SUPERVISOR, "/clientes", json!({"nombre": "Beta", "correo": "beta@test", "ubicacion": {"lat": -33.4, "lng": -70.6}}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = res.json::<Vec<Value>>().await?;
    assert_eq!(created[0]["id"], 2);
    assert!(created[0]["ubicacion"].is_string());

    Ok(())
}

#[tokio::test]
async fn technicians_only_see_their_own_visits() -> Result<()> {
    let server = common::ensure_server().await?;

    assert_eq!(server.get_as(TECHNICIAN, "/visitas/1").send().await?.status(), StatusCode::OK);
    assert_eq!(server.get_as(TECHNICIAN, "/visitas/2").send().await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.get_as(SUPERVISOR, "/visitas/2").send().await?.status(), StatusCode::OK);

    let res = server.get_as(TECHNICIAN, &format!("/visitas/tecnico/{}", TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(ids(&res.json::<Vec<Value>>().await?, "id"), vec![1]);

    let res = server.get_as(TECHNICIAN, &format!("/visitas/tecnico/{}", OTHER_TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    assert_eq!(server.get_as(TECHNICIAN, "/visitas").send().await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.delete_as(SUPERVISOR, "/visitas/1").send().await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.delete_as(ADMIN, "/visitas/1").send().await?.status(), StatusCode::OK);
    assert_eq!(server.delete_as(ADMIN, "/visitas/1").send().await?.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn reports_are_filed_by_technicians_for_themselves() -> Result<()> {
    let server = common::ensure_server().await?;
    let report = |technician: i64| {
        json!({
            "id_visita": 1,
            "id_tecnico": technician,
            "id_supervisor": SUPERVISOR,
            "horaInicio": "2024-02-03T09:00:00",
            "horaFin": "2024-02-03T10:30:00",
            "descripcion": "Mantención preventiva",
            "estado": "Pendiente",
            "evidencia": "https://cdn.fieldops.test/r/3.jpg",
        })
    };

    let res = server.post_as(TECHNICIAN, "/reportes", report(TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.json::<Value>().await?["id"], 3);

    let res = server.post_as(TECHNICIAN, "/reportes", report(OTHER_TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.post_as(SUPERVISOR, "/reportes", report(TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let mut bad = report(TECHNICIAN);
    bad["evidencia"] = json!("ftp://files/r.jpg");
    let res = server.post_as(TECHNICIAN, "/reportes", bad).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.get_as(TECHNICIAN, &format!("/reportes/tecnico/{}", TECHNICIAN)).send().await?;
    let mine = res.json::<Vec<Value>>().await?;
    // Newest first.
    assert_eq!(mine.iter().filter_map(|r| r["id"].as_i64()).collect::<Vec<_>>(), vec![3, 1]);

    assert_eq!(server.get_as(TECHNICIAN, "/reportes/2").send().await?.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn report_updates_follow_role_rules() -> Result<()> {
    let server = common::ensure_server().await?;

    // Technicians cannot move the estado.
    let res = server.put_as(TECHNICIAN, "/reportes/1", json!({"estado": "Aprobado"})).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .put_as(TECHNICIAN, "/reportes/1", json!({"descripcion": "Filtro y correa", "estado": "Aprobado"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = res.json::<Value>().await?;
    assert_eq!(updated["descripcion"], "Filtro y correa");
    assert_eq!(updated["estado"], "Pendiente");

    let res = server.put_as(TECHNICIAN, "/reportes/2", json!({"descripcion": "No es mío"})).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.put_as(SUPERVISOR, "/reportes/1", json!({"descripcion": "Sin estado"})).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.put_as(SUPERVISOR, "/reportes/1", json!({"estado": "Aprobado"})).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["estado"], "Aprobado");

    let res = server.put_as(ADMIN, "/reportes/99", json!({"estado": "Aprobado"})).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn group_membership_flow() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = server.get_as(TECHNICIAN, &format!("/grupos/tecnico/{}", TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let mine = res.json::<Value>().await?;
    assert_eq!(mine["nombre_grupo"], "Norte");
    assert_eq!(mine["supervisor"], "Sergio Supervisor");

    let res = server.get_as(OTHER_TECHNICIAN, &format!("/grupos/tecnico/{}", OTHER_TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.get_as(TECHNICIAN, "/usuarios/tecnicos-disponibles").send().await?;
    assert_eq!(ids(&res.json::<Vec<Value>>().await?, "id"), vec![OTHER_TECHNICIAN]);

    let assign = |technician: i64| json!({ "id_tecnico": technician });
    let res = server.post_as(SUPERVISOR, "/grupos/1/asignar-tecnico", assign(OTHER_TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = server.post_as(ADMIN, "/grupos/1/asignar-tecnico", assign(OTHER_TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = server.post_as(ADMIN, "/grupos/1/asignar-tecnico", assign(OTHER_TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = server.post_as(ADMIN, "/grupos/1/asignar-tecnico", assign(SUPERVISOR)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = server.post_as(ADMIN, "/grupos/9/asignar-tecnico", assign(TECHNICIAN)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.get_as(SUPERVISOR, "/grupos/1/tecnicos").send().await?;
    assert_eq!(ids(&res.json::<Vec<Value>>().await?, "id"), vec![TECHNICIAN, OTHER_TECHNICIAN]);

    let res = server.get_as(TECHNICIAN, &format!("/grupos/supervisor/{}/tecnicos", SUPERVISOR)).send().await?;
    assert_eq!(ids(&res.json::<Vec<Value>>().await?, "id"), vec![TECHNICIAN, OTHER_TECHNICIAN]);

    let res = server
        .delete_as(ADMIN, &format!("/grupos/1/quitar-tecnico/{}", OTHER_TECHNICIAN))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = server.get_as(TECHNICIAN, "/grupos/1/tecnicos-disponibles").send().await?;
    assert_eq!(ids(&res.json::<Vec<Value>>().await?, "id"), vec![OTHER_TECHNICIAN]);

    Ok(())
}

#[tokio::test]
async fn supervisor_report_listing_follows_group_membership() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = server.get_as(SUPERVISOR, &format!("/reportes/supervisor/{}/reportes", SUPERVISOR)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(ids(&res.json::<Vec<Value>>().await?, "id"), vec![1]);

    let res = server.get_as(ADMIN, &format!("/reportes/supervisor/{}/reportes", ADMIN)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn settings_require_administrators() -> Result<()> {
    let server = common::ensure_server().await?;

    assert_eq!(server.get_as(SUPERVISOR, "/configuracion").send().await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.get_as(ADMIN, "/configuracion").send().await?.status(), StatusCode::OK);

    let change = |id: i64, role: &str| json!({ "id": id, "nuevoRol": role });
    let res = server.put_as(ADMIN, "/configuracion/cambiar-rol", change(TECHNICIAN, "Jefe")).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = server.put_as(ADMIN, "/configuracion/cambiar-rol", change(99, "Supervisor")).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = server.put_as(ADMIN, "/configuracion/cambiar-rol", json!({ "id": TECHNICIAN })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
