#[cfg(test)]
mod tests {
    use crate::error::{validation, AppError, AppResult, FieldErrors, OptionExt};
    use crate::tests::support::{insert_user, test_pool};
    use crate::upstream::UpstreamError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn into_parts(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::NotFound("Habit not found".to_string());
        assert_eq!(format!("{}", error), "Not found: Habit not found");

        let error = AppError::RateLimited { retry_after_seconds: 60 };
        assert_eq!(format!("{}", error), "Rate limited. Retry after 60 seconds");

        let error = AppError::Upstream { service: "broker", status: None };
        assert_eq!(format!("{}", error), "Upstream broker unreachable");
    }

    #[tokio::test]
    async fn test_status_codes() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::RateLimited { retry_after_seconds: 30 }, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Validation(FieldErrors::default()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::Upstream { service: "nutrition", status: Some(503) }, StatusCode::BAD_GATEWAY),
            (AppError::Database("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let (status, body) = into_parts(error).await;
            assert_eq!(status, expected);
            assert_eq!(body["type"], "error");
        }
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let (status, body) = into_parts(AppError::Internal(anyhow::anyhow!("secret path /etc/shadow"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("shadow"));
        assert!(body["errors"]["error_id"].is_string());

        let (_, body) = into_parts(AppError::Database("no such column: password_hash".into())).await;
        assert!(!body.to_string().contains("password_hash"));
    }

    #[tokio::test]
    async fn test_not_found_envelope_has_empty_errors() {
        let (_, body) = into_parts(AppError::NotFound("Sensor not found".into())).await;
        assert_eq!(body["title"], "Resource not found");
        assert_eq!(body["message"], "Sensor not found");
        assert_eq!(body["errors"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_constraint_violations_are_bad_requests() {
        let (_dir, pool) = test_pool().await;

        let err = sqlx::query("INSERT INTO sensors (device_id, sensor_type_id, value) VALUES (999, 1, 0)")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));

        insert_user(&pool, "ana@example.test").await;
        let err = sqlx::query("INSERT INTO users (name, lastname, email, password_hash) VALUES ('a', 'b', 'ana@example.test', 'h')")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));

        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound(_)));
    }

    #[test]
    fn test_from_upstream_error() {
        let err = UpstreamError::Status { service: "broker", status: 404, body: "no topic".into() };
        match AppError::from(err) {
            AppError::Upstream { service, status } => {
                assert_eq!(service, "broker");
                assert_eq!(status, Some(404));
            }
            other => panic!("Expected Upstream variant, got {:?}", other),
        }
    }

    #[test]
    fn test_option_ext() {
        let some_value: Option<i32> = Some(42);
        let result: AppResult<i32> = some_value.ok_or_not_found("test entity");
        assert_eq!(result.unwrap(), 42);

        let none_value: Option<i32> = None;
        match none_value.ok_or_not_found("Habit") {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Habit not found"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_field_errors_collect_per_field() {
        let mut errors = FieldErrors::default();
        assert!(errors.clone().finish().is_ok());

        let raw_name = Some("  Ana ".to_string());
        let name = validation::require_text(&mut errors, "name", &raw_name);
        assert_eq!(name, Some("Ana"));
        validation::require_text(&mut errors, "lastname", &None);
        validation::require_text(&mut errors, "description", &Some("   ".to_string()));
        validation::require::<i64>(&mut errors, "user_id", None);
        validation::validate_flag(&mut errors, "active", Some(3));
        validation::validate_flag(&mut errors, "active", Some(1));

        assert_eq!(errors.fields().collect::<Vec<_>>(), ["active", "description", "lastname", "user_id"]);
        assert_eq!(errors.messages("active").len(), 1);
        assert!(errors.messages("name").is_empty());
        assert!(matches!(errors.finish(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_email_and_password_rules() {
        let mut errors = FieldErrors::default();
        validation::validate_email(&mut errors, "email", "ana@example.test");
        validation::validate_password(&mut errors, "password", "12345678", 8);
        assert!(errors.is_empty());

        for bad in ["ana", "@example.test", "ana@localhost", "ana@.test", "a na@example.test"] {
            let mut errors = FieldErrors::default();
            validation::validate_email(&mut errors, "email", bad);
            assert!(!errors.is_empty(), "{:?} should be rejected", bad);
        }

        let mut errors = FieldErrors::default();
        validation::validate_password(&mut errors, "password", "ñandú12", 8);
        assert_eq!(errors.messages("password").len(), 1);
    }
}
