use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    /// Meta for an unpaged list.
    pub fn total(total: i64) -> Self {
        Self {
            page: None,
            per_page: None,
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_meta_serializes_nulls() {
        let value = serde_json::to_value(Meta::empty()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "page": null, "per_page": null, "total": null })
        );
    }

    #[test]
    fn success_wraps_data() {
        let resp = ApiResponse::success("OK", 7, Some(Meta::new(2, 10, 31)));
        let value = serde_json::to_value(resp).unwrap();
        assert_eq!(value["message"], "OK");
        assert_eq!(value["data"], 7);
        assert_eq!(value["meta"]["page"], 2);
        assert_eq!(value["meta"]["total"], 31);
    }
}
