use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}
