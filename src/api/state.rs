use crate::service::SpeedService;

#[derive(Clone)]
pub struct AppState {
    pub service: SpeedService,
}
