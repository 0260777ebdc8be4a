use riskgate_core::Config;
use riskgate_rules::RiskService;

pub struct AppState {
    pub service: RiskService,
    pub config: Config,
}

impl AppState {
    pub fn new(service: RiskService, config: Config) -> Self {
        Self { service, config }
    }
}
