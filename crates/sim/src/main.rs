mod config;
mod session;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::time::MissedTickBehavior;

use config::SimConfig;
use motor::{LinkConditions, MotorConfig, ServerPolicy};
use session::Session;

#[derive(Parser)]
#[command(name = "motor-sim")]
#[command(about = "Headless server, owner and observer running over simulated lossy links")]
struct Args {
    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 144, help = "Frames per second driving the clocks")]
    frame_rate: u32,

    #[arg(short, long, default_value_t = 20.0, help = "Seconds to simulate, 0 runs until Ctrl-C")]
    duration: f64,

    #[arg(long, help = "Pace frames against the wall clock")]
    realtime: bool,

    #[arg(long, default_value_t = 7)]
    seed: u64,

    #[arg(long, default_value_t = 1.0, help = "Seconds between progress reports")]
    report_interval: f64,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, default_value_t = 5.0)]
    move_rate: f32,

    #[arg(long, default_value_t = 16)]
    queue_capacity: usize,

    #[arg(long, default_value_t = 0, help = "Ticks the server may re-apply the last input")]
    prediction_budget: u32,

    #[arg(long, help = "Always send a timing step of zero")]
    no_timing_feedback: bool,
}

impl Args {
    fn into_config(self) -> SimConfig {
        let duration = (self.duration > 0.0).then_some(self.duration);

        SimConfig {
            tick_rate: self.tick_rate,
            frame_rate: self.frame_rate.max(1),
            duration,
            // An unbounded run only makes sense against the wall clock.
            realtime: self.realtime || duration.is_none(),
            seed: self.seed,
            report_interval: self.report_interval.max(0.01),
            link: LinkConditions {
                loss_percent: self.loss_percent.clamp(0.0, 100.0),
                min_latency: f64::from(self.min_latency) / 1000.0,
                max_latency: f64::from(self.max_latency.max(self.min_latency)) / 1000.0,
                jitter: f64::from(self.jitter) / 1000.0,
            },
            motor: MotorConfig {
                move_rate: self.move_rate,
                ..MotorConfig::default()
            },
            policy: ServerPolicy {
                queue_capacity: self.queue_capacity,
                prediction_budget: self.prediction_budget,
                timing_feedback: !self.no_timing_feedback,
            },
            ..SimConfig::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    log::info!("Starting simulation: {config:?}");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: SimConfig) -> Result<()> {
    let mut session = Session::new(&config)?;

    let frame = Duration::from_secs_f64(1.0 / f64::from(config.frame_rate));
    let dt = frame.as_secs_f32();
    let mut interval = tokio::time::interval(frame);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut next_report = config.report_interval;

    loop {
        if config.duration.is_some_and(|limit| session.now() >= limit) {
            break;
        }

        if config.realtime {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted");
                    break;
                }
            }
        }

        session.frame(dt)?;

        if session.now() >= next_report {
            next_report += config.report_interval;
            let report = session.report()?;
            log::info!(
                "t={:.1}s tick owner={} server={} | tick={:.2}ms buffered={} queued={} | lead={:.3} observer={:.3}",
                report.time,
                report.owner_tick,
                report.server_tick,
                report.adjusted_tick * 1000.0,
                report.buffered,
                report.queued,
                report.owner_lead,
                report.observer_error,
            );
        }
    }

    let summary = session.summary();
    log::info!(
        "Finished at t={:.1}s: uplink {:?}, downlink {:?}, poses {:?}",
        session.now(),
        summary.uplink,
        summary.downlink,
        summary.poselink
    );
    if summary.evicted_inputs > 0 {
        log::warn!("{} inputs evicted from the server queue", summary.evicted_inputs);
    }
    if summary.undecodable > 0 {
        log::warn!("{} packets failed to decode", summary.undecodable);
    }

    Ok(())
}
