use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateStatementRequest {
    #[schema(example = "statement.md")]
    pub filename: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatementRequest {
    /// Replacement text for the whole statement.
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatementResponse {
    pub filename: String,
    pub text: String,
}
