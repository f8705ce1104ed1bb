#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;

    use crate::mail::MailKind;
    use crate::tests::support::{test_app, test_app_with, PASSWORD};

    #[tokio::test]
    async fn register_verify_and_login() {
        let app = test_app().await;

        let (status, body) = app
            .post(
                "/api/users",
                None,
                json!({ "name": "Ana", "lastname": "Pérez", "email": " Ana@Example.TEST ", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["type"], "success");
        assert_eq!(body["data"]["email"], "ana@example.test");
        assert!(body["data"].get("password_hash").is_none());

        // Not verified yet
        let (status, _) =
            app.post("/api/users/login", None, json!({ "email": "ana@example.test", "password": PASSWORD })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let code = app.mailer.last_code_for("ana@example.test").unwrap();
        assert_eq!(code.len(), 4);

        // Wrong code is rejected and the account stays unverified
        let wrong = if code == "1000" { "1001" } else { "1000" };
        let (status, _) = app
            .post(
                "/api/users/auth-login",
                None,
                json!({ "user_email": "ana@example.test", "password": PASSWORD, "verification_code": wrong }),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // The code may be sent as a number
        let numeric: i64 = code.parse().unwrap();
        let (status, body) = app
            .post(
                "/api/users/auth-login",
                None,
                json!({ "user_email": "ana@example.test", "password": PASSWORD, "verification_code": numeric }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, body) =
            app.post("/api/users/login", None, json!({ "email": "ANA@example.test", "password": PASSWORD })).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap();
        assert_eq!(token.len(), 43);
        assert!(body["data"]["expires_at"].is_string());
        assert_eq!(body["data"]["user"]["devices"], json!([]));
        assert_eq!(app.state.metrics.get_snapshot().logins, 1);
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let app = test_app().await;
        let (status, body) =
            app.post("/api/users", None, json!({ "name": "", "email": "not-an-email", "password": "short" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors = &body["errors"];
        for field in ["name", "lastname", "email", "password"] {
            assert!(errors.get(field).is_some(), "missing error for {}", field);
        }
        assert_eq!(app.count("users").await, 0);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let app = test_app().await;
        app.register_and_login("ana@example.test").await;
        let (status, body) = app
            .post(
                "/api/users",
                None,
                json!({ "name": "Otra", "lastname": "Persona", "email": "ANA@example.test", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "error");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = test_app().await;
        app.register_and_login("ana@example.test").await;
        let (status, body) =
            app.post("/api/users/login", None, json!({ "email": "ana@example.test", "password": "wrong-pass" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["title"], "Unauthorized");

        let (status, _) =
            app.post("/api/users/login", None, json!({ "email": "nobody@example.test", "password": PASSWORD })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_routes_require_a_valid_token() {
        let app = test_app().await;
        let (status, _) = app.request(Method::GET, "/api/habits", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.get("/api/habits", "not-a-real-token").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Public listing stays open
        let (status, _) = app.request(Method::GET, "/api/users", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = test_app().await;
        let (user_id, token) = app.register_and_login("ana@example.test").await;

        let (status, _) = app.get(&format!("/api/users/{}", user_id), &token).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.request(Method::POST, "/api/users/logout", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.get(&format!("/api/users/{}", user_id), &token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn get_user_includes_devices_and_configurations() {
        let app = test_app().await;
        let (user_id, token) = app.register_and_login("ana@example.test").await;
        app.post("/api/dispositivos/crear-dispositivo", Some(token.as_str()), json!({ "kind": "pesa" })).await;
        app.post(
            "/api/configurations",
            Some(token.as_str()),
            json!({ "user_id": user_id, "configuration_type_id": 1, "data": "8000" }),
        )
        .await;

        let (status, body) = app.get(&format!("/api/users/{}", user_id), &token).await;
        assert_eq!(status, StatusCode::OK);
        let user = &body["data"];
        assert_eq!(user["devices"].as_array().unwrap().len(), 1);
        assert_eq!(user["devices"][0]["sensors"][0]["sensor_type"]["name"], "Peso");
        assert_eq!(user["configurations"][0]["data"], "8000");

        let (status, _) = app.get("/api/users/9999", &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.get("/api/users/abc", &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resend_code_and_recover_password() {
        let app = test_app().await;
        let (user_id, _) = app.register_and_login("ana@example.test").await;

        let (status, _) = app.post("/api/users/recuperar-contra", None, json!({ "email": "ghost@example.test" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.post("/api/users/recuperar-contra", None, json!({ "email": "ana@example.test" })).await;
        assert_eq!(status, StatusCode::OK);

        // Login is blocked until the new code is confirmed
        let (status, _) =
            app.post("/api/users/login", None, json!({ "email": "ana@example.test", "password": PASSWORD })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.request(Method::POST, &format!("/api/users/code-verify/{}", user_id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        let codes = app
            .mailer
            .sent()
            .into_iter()
            .filter(|m| matches!(m.kind, MailKind::VerificationCode { .. }))
            .count();
        assert_eq!(codes, 3);

        let code = app.mailer.last_code_for("ana@example.test").unwrap();
        let (status, _) = app
            .post(
                "/api/users/auth-login",
                None,
                json!({ "user_email": "ana@example.test", "password": PASSWORD, "verification_code": code }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            app.post("/api/users/login", None, json!({ "email": "ana@example.test", "password": PASSWORD })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_password_checks_the_old_one() {
        let app = test_app().await;
        let (_, token) = app.register_and_login("ana@example.test").await;

        let (status, _) = app
            .put(
                "/api/users/update-password",
                &token,
                json!({ "old_password": "wrong-pass", "new_password": "brand-new-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .put("/api/users/update-password", &token, json!({ "old_password": PASSWORD, "new_password": "short" }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = app
            .put(
                "/api/users/update-password",
                &token,
                json!({ "old_password": PASSWORD, "new_password": "brand-new-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.mailer.sent().iter().any(|m| m.kind == MailKind::PasswordChanged));

        let (status, _) =
            app.post("/api/users/login", None, json!({ "email": "ana@example.test", "password": PASSWORD })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app
            .post("/api/users/login", None, json!({ "email": "ana@example.test", "password": "brand-new-pass" }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_password_accepts_camel_case_fields() {
        let app = test_app().await;
        let (_, token) = app.register_and_login("ana@example.test").await;

        let (status, _) = app
            .put(
                "/api/users/update-password",
                &token,
                json!({ "oldPassword": PASSWORD, "newPassword": "brand-new-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .post("/api/users/login", None, json!({ "email": "ana@example.test", "password": "brand-new-pass" }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn users_update_only_themselves() {
        let app = test_app().await;
        let (ana_id, ana_token) = app.register_and_login("ana@example.test").await;
        let (luis_id, _) = app.register_and_login("luis@example.test").await;

        let (status, _) = app.put(&format!("/api/users/{}", luis_id), &ana_token, json!({ "name": "Hack" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app.delete(&format!("/api/users/{}", luis_id), &ana_token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.put(&format!("/api/users/{}", ana_id), &ana_token, json!({ "name": "Ana María" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Ana María");
        assert_eq!(body["data"]["lastname"], "Pérez");
        assert!(app.mailer.sent().iter().any(|m| m.kind == MailKind::ProfileUpdated));

        // Taking someone else's email is refused
        let (status, _) = app.put("/api/users/actualizar", &ana_token, json!({ "email": "luis@example.test" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // An empty update returns the row unchanged
        let (status, body) = app.put("/api/users/actualizar", &ana_token, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Ana María");
    }

    #[tokio::test]
    async fn deleting_self_cascades() {
        let app = test_app().await;
        let (user_id, token) = app.register_and_login("ana@example.test").await;
        app.post("/api/dispositivos/crear-dispositivo", Some(token.as_str()), json!({ "kind": "brazalete" })).await;
        assert_eq!(app.count("sensors").await, 6);

        let (status, _) = app.delete(&format!("/api/users/{}", user_id), &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.count("users").await, 0);
        assert_eq!(app.count("devices").await, 0);
        assert_eq!(app.count("sensors").await, 0);
        assert_eq!(app.count("api_tokens").await, 0);

        let (status, _) = app.get("/api/habits", &token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_is_rate_limited() {
        let app = test_app_with("http://127.0.0.1:9", "http://127.0.0.1:9", 2).await;
        let creds = json!({ "email": "ana@example.test", "password": "whatever-pass" });

        for _ in 0..2 {
            let (status, _) = app.post("/api/users/login", None, creds.clone()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, body) = app.post("/api/users/login", None, creds.clone()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["errors"]["retry_after_seconds"].as_u64().unwrap() >= 1);

        // Other endpoints keep their own budget
        let (status, _) = app.post("/api/users/recuperar-contra", None, json!({ "email": "x@example.test" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rotating_forwarded_for_does_not_reset_the_limit() {
        let app = test_app_with("http://127.0.0.1:9", "http://127.0.0.1:9", 2).await;
        let creds = json!({ "email": "ana@example.test", "password": "whatever-pass" });

        let mut limited = 0;
        for i in 0..10 {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/api/users/login")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", format!("203.0.113.{}", i))
                .header("x-real-ip", format!("198.51.100.{}", i))
                .body(Body::from(creds.to_string()))
                .unwrap();
            let (status, _) = app.send(request).await;
            if status == StatusCode::TOO_MANY_REQUESTS {
                limited += 1;
            }
        }
        assert_eq!(limited, 8);
    }
}
