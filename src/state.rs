use std::sync::Arc;

use crate::{
    catalog::ProductCatalog,
    db::{DbPool, OrmConn},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub catalog: Arc<dyn ProductCatalog>,
    pub jwt_secret: Arc<str>,
}
