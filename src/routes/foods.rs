use axum::{
    extract::{Query, State},
    response::Response,
};

use crate::{
    error::{AppError, AppResult, FieldErrors},
    middleware::JsonBody,
    state::AppState,
    types::{ok, FoodQuery, NutritionRequest},
    upstream::nutrition::has_no_hints,
};

pub async fn find_food(State(state): State<AppState>, Query(query): Query<FoodQuery>) -> AppResult<Response> {
    let name = query
        .nombrealimento
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("Please provide the food name (nombrealimento)".to_string()))?;

    let document = state.nutrition.search_food(name).await?;
    if has_no_hints(&document) {
        return Err(AppError::NotFound(format!("No results for {:?}", name)));
    }
    Ok(ok("Food found", "Food fetched successfully", document))
}

/// Appends the scale's unit to every ingredient and asks for a nutrition analysis.
pub async fn calculate_nutrition(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<NutritionRequest>,
) -> AppResult<Response> {
    let Some(ingredients) = req.ingr else {
        let mut errors = FieldErrors::default();
        errors.add("ingr", "ingr is required");
        return Err(AppError::Validation(errors));
    };

    let unit: String = sqlx::query_scalar("SELECT unit FROM sensor_types WHERE name = 'Peso'")
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("The Peso sensor type is not configured".to_string()))?;

    let ingredients: Vec<String> = ingredients.iter().map(|i| format!("{} {}", i.trim(), unit)).collect();
    let title = req.title.as_deref().map(str::trim).filter(|t| !t.is_empty()).unwrap_or("x");

    let document = state.nutrition.nutrition_details(title, &ingredients).await?;
    Ok(ok("Nutrition", "Nutrition calculated successfully", document))
}
