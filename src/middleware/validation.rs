use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `Json<T>` whose rejections use the API error envelope: malformed JSON is a
/// 400, a body of the wrong shape is a 422 under the `body` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// Parses a path id, answering 404 for anything that is not a positive integer.
pub fn parse_id(raw: &str, entity: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_positive_integers() {
        assert_eq!(parse_id("42", "Habit").unwrap(), 42);
        assert!(matches!(parse_id("0", "Habit"), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id("abc", "Habit"), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id("-3", "Habit"), Err(AppError::NotFound(_))));
    }
}
