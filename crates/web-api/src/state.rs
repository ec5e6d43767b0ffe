use application::SessionContext;

#[derive(Clone)]
pub struct AppState {
    pub session: SessionContext,
    /// `GET /api/messages` 未指定 limit 时返回的条数
    pub history_limit: u32,
}

impl AppState {
    pub fn new(session: SessionContext, history_limit: u32) -> Self {
        Self {
            session,
            history_limit,
        }
    }
}
