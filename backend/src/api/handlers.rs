//! Stateless and settings endpoints
//!
//! Formatter preview, module catalogue and orchestrator settings.

use crate::api::utils::RouterState;
use crate::chat::formatter::{format_message, Block};
use crate::chat::models::Module;
use crate::error::AppError;
use crate::orchestrator::{validate_and_apply_config_update, ConfigUpdateRequest, OrchestratorConfig};
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

/// Maximum text accepted by the formatter endpoint
pub const MAX_FORMAT_LENGTH: usize = 100_000;

/// Request to format text
#[derive(Debug, Deserialize)]
pub struct FormatRequest {
    /// Raw model output
    pub text: String,
}

/// Formatted blocks
#[derive(Debug, Serialize)]
pub struct FormatResponse {
    /// Display blocks, in order
    pub blocks: Vec<Block>,
}

/// One module in the catalogue
#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    /// Module id
    pub id: Module,
    /// Display name
    pub name: &'static str,
}

/// POST /api/format - Run the message formatter
pub async fn format_text(Json(request): Json<FormatRequest>) -> Result<Json<FormatResponse>, AppError> {
    if request.text.len() > MAX_FORMAT_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Text exceeds maximum length of {} bytes",
            MAX_FORMAT_LENGTH
        )));
    }
    Ok(Json(FormatResponse {
        blocks: format_message(&request.text),
    }))
}

/// GET /api/modules - List modules in menu order
pub async fn list_modules() -> Json<Vec<ModuleInfo>> {
    Json(
        Module::ALL
            .iter()
            .map(|m| ModuleInfo {
                id: *m,
                name: m.display_name(),
            })
            .collect(),
    )
}

/// GET /api/config - Current orchestrator settings
pub async fn get_config(State(state): State<RouterState>) -> Json<OrchestratorConfig> {
    Json(state.config.read().await.clone())
}

/// POST /api/config - Validate and apply a partial settings update
pub async fn update_config(
    State(state): State<RouterState>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<Json<OrchestratorConfig>, AppError> {
    let mut config = state.config.write().await;
    let updated = validate_and_apply_config_update(config.clone(), request)?;
    *config = updated.clone();
    tracing::info!(config = ?updated, "Orchestrator config updated");
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::utils::test_support::test_state;
    use crate::services::ImageSize;

    #[tokio::test]
    async fn test_format_text() {
        let response = format_text(Json(FormatRequest {
            text: "# Title\n- item".to_string(),
        }))
        .await
        .unwrap()
        .0;
        assert_eq!(response.blocks.len(), 2);
    }

    #[tokio::test]
    async fn test_list_modules_in_menu_order() {
        let modules = list_modules().await.0;
        assert_eq!(modules.len(), 6);
        assert_eq!(modules[0].id, Module::General);
        assert_eq!(modules[5].name, "Text to Speech");
    }

    #[tokio::test]
    async fn test_config_update_applies_and_validates() {
        let state = test_state();
        let updated = update_config(
            State(state.clone()),
            Json(ConfigUpdateRequest {
                image_size: Some(ImageSize::Landscape),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(updated.image_size, ImageSize::Landscape);
        assert_eq!(get_config(State(state.clone())).await.0.image_size, ImageSize::Landscape);

        let rejected = update_config(
            State(state.clone()),
            Json(ConfigUpdateRequest {
                max_input_length: Some(0),
                ..Default::default()
            }),
        )
        .await;
        assert!(matches!(rejected, Err(AppError::InvalidInput(_))));
        assert_eq!(get_config(State(state)).await.0.max_input_length, 10_000);
    }
}
