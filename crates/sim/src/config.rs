use motor::{
    CancelMode, EmitterConfig, EstimatorConfig, LinkConditions, MotorConfig, ServerPolicy,
};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub tick_rate: u32,
    pub frame_rate: u32,
    /// Simulated seconds to run; `None` runs until interrupted.
    pub duration: Option<f64>,
    pub realtime: bool,
    pub seed: u64,
    pub report_interval: f64,
    pub link: LinkConditions,
    pub motor: MotorConfig,
    pub policy: ServerPolicy,
    pub estimator: EstimatorConfig,
    pub emitter: EmitterConfig,
    pub proxy_cancel: CancelMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            frame_rate: 144,
            duration: Some(20.0),
            realtime: false,
            seed: 7,
            report_interval: 1.0,
            link: LinkConditions::default(),
            motor: MotorConfig::default(),
            policy: ServerPolicy::default(),
            estimator: EstimatorConfig::default(),
            emitter: EmitterConfig {
                min_interval: Some(0.1),
                ..EmitterConfig::default()
            },
            proxy_cancel: CancelMode::Direct,
        }
    }
}
