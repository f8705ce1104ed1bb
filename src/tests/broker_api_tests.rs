#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use wiremock::matchers::{basic_auth, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::tests::support::{test_app_with, TestApp};

    async fn app_with_broker() -> (MockServer, TestApp) {
        let server = MockServer::start().await;
        let app = test_app_with(&server.uri(), "http://127.0.0.1:9", 1000).await;
        (server, app)
    }

    async fn mount_retained(server: &MockServer, topic: &str, payload: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/mqtt/retainer/message/{}", topic)))
            .and(basic_auth("broker-key", "broker-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "topic": topic,
                "qos": 0,
                "payload": STANDARD.encode(payload),
            })))
            .mount(server)
            .await;
    }

    async fn post_empty(app: &TestApp, uri: &str, token: &str) -> (StatusCode, Value) {
        app.request(Method::POST, uri, Some(token), None).await
    }

    #[tokio::test]
    async fn readings_are_decoded_and_labelled() {
        let (server, app) = app_with_broker().await;
        let (_, token) = app.register_and_login("ana@example.test").await;
        mount_retained(&server, "BrazaletePasos", "8000").await;
        mount_retained(&server, "BrazaletePulso", r#"{"bpm": 72}"#).await;
        mount_retained(&server, "Peso", "hola").await;

        let (status, body) = post_empty(&app, "/api/emqx/obtener-pasos", &token).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["retained_message"], 8000);
        assert_eq!(body["data"]["unit"], "pasos");

        let (_, body) = post_empty(&app, "/api/emqx/obtener-ritmo", &token).await;
        assert_eq!(body["data"]["retained_message"], json!({ "bpm": 72 }));
        assert_eq!(body["data"]["unit"], "bpm");

        let (_, body) = post_empty(&app, "/api/emqx/obtener-peso", &token).await;
        assert_eq!(body["data"]["retained_message"], "hola");
        assert_eq!(body["data"]["unit"], "gr");

        assert_eq!(app.state.metrics.get_snapshot().upstream_calls, 3);
    }

    #[tokio::test]
    async fn topic_retained_requires_a_topic() {
        let (server, app) = app_with_broker().await;
        let (_, token) = app.register_and_login("ana@example.test").await;
        mount_retained(&server, "Sala", "21.5").await;

        let (status, body) = app.post("/api/emqx/topic-retained", Some(token.as_str()), json!({ "topic": "Sala" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["retained_message"], 21.5);

        let (status, _) = app.post("/api/emqx/topic-retained", Some(token.as_str()), json!({ "topic": " " })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn publish_sends_a_retained_plain_message() {
        let (server, app) = app_with_broker().await;
        let (_, token) = app.register_and_login("ana@example.test").await;
        Mock::given(method("POST"))
            .and(path("/publish"))
            .and(body_json(json!({
                "payload_encoding": "plain",
                "topic": "Luces",
                "qos": 0,
                "payload": "encender",
                "retain": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "0005F8" })))
            .expect(1)
            .mount(&server)
            .await;

        let (status, body) = app
            .post("/api/emqx/publish-emqx-topic", Some(token.as_str()), json!({ "topic_name": "Luces", "topic_message": "encender" }))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["id"], "0005F8");

        let (status, _) =
            app.post("/api/emqx/publish-emqx-topic", Some(token.as_str()), json!({ "topic_name": "Luces" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn screen_mode_must_be_between_one_and_four() {
        let (server, app) = app_with_broker().await;
        let (_, token) = app.register_and_login("ana@example.test").await;
        Mock::given(method("POST"))
            .and(path("/publish"))
            .and(body_json(json!({
                "payload_encoding": "plain",
                "topic": "BrazaletePantalla",
                "qos": 0,
                "payload": "3",
                "retain": true,
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let (status, body) = app.post("/api/emqx/mandar-a-pantalla", Some(token.as_str()), json!({ "topic_message": 3 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], Value::Null);
        let (status, _) = app.post("/api/emqx/mandar-a-pantalla", Some(token.as_str()), json!({ "topic_message": "3" })).await;
        assert_eq!(status, StatusCode::OK);

        for bad in [json!(0), json!(5), json!("tres"), Value::Null] {
            let (status, _) = app.post("/api/emqx/mandar-a-pantalla", Some(token.as_str()), json!({ "topic_message": bad })).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn step_goal_compares_with_latest_configuration() {
        let (server, app) = app_with_broker().await;
        let (user_id, token) = app.register_and_login("ana@example.test").await;
        mount_retained(&server, "BrazaletePasos", "8000").await;

        // No goal configured yet
        let (status, _) = post_empty(&app, "/api/configurations/meta-pasos", &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        app.post(
            "/api/configurations",
            Some(token.as_str()),
            json!({ "user_id": user_id, "configuration_type_id": 1, "data": "8000" }),
        )
        .await;
        let (status, body) = post_empty(&app, "/api/configurations/meta-pasos", &token).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["type"], "success");
        assert_eq!(body["data"]["goal"], "8000");
        assert_eq!(body["data"]["unit"], "pasos");

        // The newest configuration wins
        app.post(
            "/api/configurations",
            Some(token.as_str()),
            json!({ "user_id": user_id, "configuration_type_id": 1, "data": "10000" }),
        )
        .await;
        let (status, body) = post_empty(&app, "/api/emqx/meta-pasos", &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "error");
        assert_eq!(body["data"]["goal"], "10000");
        assert_eq!(body["data"]["retained_message"], 8000);

        let snapshot = app.state.metrics.get_snapshot();
        assert_eq!((snapshot.goals_matched, snapshot.goals_missed), (1, 1));
    }

    #[tokio::test]
    async fn goals_only_read_the_callers_configuration() {
        let (server, app) = app_with_broker().await;
        let (ana_id, _) = app.register_and_login("ana@example.test").await;
        let (_, luis_token) = app.register_and_login("luis@example.test").await;
        mount_retained(&server, "BrazaleteDistancia", "2.5").await;

        app.post(
            "/api/configurations",
            Some(luis_token.as_str()),
            json!({ "user_id": ana_id, "configuration_type_id": 2, "data": "2.5" }),
        )
        .await;
        let (status, _) = post_empty(&app, "/api/configurations/meta-distancia", &luis_token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upstream_failures_become_bad_gateway() {
        let (server, app) = app_with_broker().await;
        let (_, token) = app.register_and_login("ana@example.test").await;
        Mock::given(method("GET"))
            .and(path("/mqtt/retainer/message/BrazaleteTemperatura"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal broker details"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mqtt/retainer/message/BrazaleteAlcohol"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "topic": "BrazaleteAlcohol" })))
            .mount(&server)
            .await;

        let (status, body) = post_empty(&app, "/api/emqx/obtener-temperatura", &token).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["errors"]["service"], "broker");
        assert_eq!(body["errors"]["upstream_status"], 500);
        assert!(!body.to_string().contains("internal broker details"));

        let (status, body) = post_empty(&app, "/api/emqx/obtener-alcohol", &token).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["errors"]["upstream_status"], Value::Null);

        assert_eq!(app.state.metrics.get_snapshot().upstream_failures, 2);
    }
}
