use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Comment;

fn default_rating() -> i16 {
    5
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewCommentRequest {
    #[serde(default = "default_rating")]
    pub rating: i16,
    pub comment: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CommentList {
    #[schema(value_type = Vec<Comment>)]
    pub items: Vec<Comment>,
}
