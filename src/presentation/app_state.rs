// Application state for HTTP handlers
use crate::application::dashboard_session::DashboardSession;

#[derive(Clone)]
pub struct AppState {
    pub session: DashboardSession,
}
