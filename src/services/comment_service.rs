use uuid::Uuid;

use crate::{
    dto::comments::{CommentList, NewCommentRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Comment,
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_COMMENT_LEN: usize = 5;

/// Returns the rating and trimmed text of an acceptable review.
fn validate_comment(payload: &NewCommentRequest) -> AppResult<(i16, String)> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    let text = payload.comment.trim();
    if text.chars().count() < MIN_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "comment must be at least {MIN_COMMENT_LEN} characters"
        )));
    }
    Ok((payload.rating, text.to_string()))
}

pub async fn list_for_product(
    state: &AppState,
    product_id: i64,
) -> AppResult<ApiResponse<CommentList>> {
    let items = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, product_id, user_id, user_name, rating, comment, created_at
        FROM comments
        WHERE product_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(&state.pool)
    .await?;

    let meta = Meta::total(items.len() as i64);
    Ok(ApiResponse::success("OK", CommentList { items }, Some(meta)))
}

pub async fn add_comment(
    state: &AppState,
    user: &AuthUser,
    product_id: i64,
    payload: NewCommentRequest,
) -> AppResult<ApiResponse<Comment>> {
    let (rating, text) = validate_comment(&payload)?;

    // reviews only attach to products the catalog knows
    state.catalog.get_product(product_id).await?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (id, product_id, user_id, user_name, rating, comment)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, product_id, user_id, user_name, rating, comment, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(user.user_id)
    .bind(user.user_name.as_str())
    .bind(rating)
    .bind(text)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(
        comment_id = %comment.id,
        product_id,
        rating,
        "comment added"
    );
    Ok(ApiResponse::success("Comment added", comment, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rating: i16, comment: &str) -> NewCommentRequest {
        NewCommentRequest {
            rating,
            comment: comment.to_string(),
        }
    }

    #[test]
    fn accepts_valid_review_and_trims() {
        let (rating, text) = validate_comment(&request(4, "  Great value  ")).unwrap();
        assert_eq!(rating, 4);
        assert_eq!(text, "Great value");
    }

    #[test]
    fn rejects_rating_out_of_range() {
        assert!(validate_comment(&request(0, "Great value")).is_err());
        assert!(validate_comment(&request(6, "Great value")).is_err());
    }

    #[test]
    fn rejects_short_comment() {
        assert!(validate_comment(&request(5, " ok  ")).is_err());
        assert!(validate_comment(&request(5, "fine!")).is_ok());
    }
}
