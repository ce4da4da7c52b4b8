use anyhow::{Context, Result};
use glam::Vec3;

use motor::clock::ManualStep;
use motor::net::LinkStats;
use motor::prediction::cancel_velocity;
use motor::{
    ActionFlags, BodyId, CancelMode, ClockConfig, FixedClock, InputSample, LossyLink, Message,
    OwnerMotor, Packet, Phase, PhysicsConfig, PhysicsEngine, PhysicsWorld, Pose, PoseEmitter,
    RemotePoseUpdate, RemoteStateEstimator, ServerMotor, ServerReply, Transform,
};

use crate::config::SimConfig;

const ENTITY_ID: u32 = 1;
const SPAWN: Vec3 = Vec3::new(0.0, 0.5, 0.0);
const JUMP_PERIOD: f64 = 3.0;

fn build_world() -> (PhysicsWorld, BodyId) {
    let mut world = PhysicsWorld::new(PhysicsConfig::default());
    world.add_ground(0.0, 100.0);
    let body = world.add_dynamic_sphere(SPAWN, 0.5, 1.0);
    (world, body)
}

/// Strafes in a slow square and hops every few seconds.
fn scripted_axes(time: f64) -> (f32, f32) {
    let phase = (time / 2.0) as u64 % 4;
    match phase {
        0 => (1.0, 0.0),
        1 => (0.0, 1.0),
        2 => (-1.0, 0.0),
        _ => (0.0, -1.0),
    }
}

struct OwnerPeer {
    physics: PhysicsWorld,
    motor: OwnerMotor,
    outbox: Vec<InputSample>,
}

impl ManualStep for OwnerPeer {
    fn manual_step(&mut self, dt: f32) {
        self.physics.manual_step(dt);
    }
}

struct ServerPeer {
    physics: PhysicsWorld,
    motor: ServerMotor,
    emitter: PoseEmitter,
    replies: Vec<ServerReply>,
    poses: Vec<RemotePoseUpdate>,
}

impl ManualStep for ServerPeer {
    fn manual_step(&mut self, dt: f32) {
        self.physics.manual_step(dt);
    }
}

struct ObserverPeer {
    physics: PhysicsWorld,
    proxy: BodyId,
    estimator: RemoteStateEstimator,
    displayed: Transform,
    cancel: CancelMode,
}

impl ManualStep for ObserverPeer {
    fn manual_step(&mut self, dt: f32) {
        self.physics.manual_step(dt);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub time: f64,
    pub owner_tick: u32,
    pub server_tick: u32,
    pub adjusted_tick: f32,
    pub buffered: usize,
    pub queued: usize,
    /// Distance the predicted body runs ahead of the authoritative one.
    pub owner_lead: f32,
    pub observer_error: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub uplink: LinkStats,
    pub downlink: LinkStats,
    pub poselink: LinkStats,
    pub evicted_inputs: u64,
    pub undecodable: u64,
}

/// One server, one owning client and one observer, each with its own clock,
/// connected by lossy links carrying encoded packets.
pub struct Session {
    now: f64,
    owner: OwnerPeer,
    owner_clock: FixedClock<OwnerPeer>,
    server: ServerPeer,
    server_clock: FixedClock<ServerPeer>,
    observer: ObserverPeer,
    observer_clock: FixedClock<ObserverPeer>,
    uplink: LossyLink<Vec<u8>>,
    downlink: LossyLink<Vec<u8>>,
    poselink: LossyLink<Vec<u8>>,
    next_jump: f64,
    undecodable: u64,
}

impl Session {
    pub fn new(config: &SimConfig) -> Result<Self> {
        let clock_config = ClockConfig::from_tick_rate(config.tick_rate);

        let (physics, body) = build_world();
        let motor = OwnerMotor::bind(&physics, body, config.motor.clone())
            .context("binding owner motor")?;
        let owner = OwnerPeer {
            physics,
            motor,
            outbox: Vec::new(),
        };

        let (physics, body) = build_world();
        let motor = ServerMotor::bind(&physics, body, config.motor.clone(), config.policy.clone())
            .context("binding server motor")?;
        let server = ServerPeer {
            physics,
            motor,
            emitter: PoseEmitter::new(config.emitter.clone()),
            replies: Vec::new(),
            poses: Vec::new(),
        };

        let (physics, proxy) = build_world();
        let observer = ObserverPeer {
            physics,
            proxy,
            estimator: RemoteStateEstimator::new(config.estimator.clone()),
            displayed: Transform::from_pose(Pose::new(SPAWN, Default::default())),
            cancel: config.proxy_cancel,
        };

        Ok(Self {
            now: 0.0,
            owner,
            owner_clock: owner_clock(clock_config.clone()),
            server,
            server_clock: server_clock(clock_config.clone()),
            observer,
            observer_clock: observer_clock(clock_config),
            uplink: LossyLink::new(config.link.clone(), config.seed),
            downlink: LossyLink::new(config.link.clone(), config.seed.wrapping_add(1)),
            poselink: LossyLink::new(config.link.clone(), config.seed.wrapping_add(2)),
            next_jump: JUMP_PERIOD,
            undecodable: 0,
        })
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advances every peer by one real frame and moves packets between them.
    pub fn frame(&mut self, dt: f32) -> Result<()> {
        self.now += f64::from(dt);
        let now = self.now;

        let (horizontal, forward) = scripted_axes(now);
        let input = self.owner.motor.input_mut();
        input.set_axes(horizontal, forward);
        if now >= self.next_jump {
            input.press(ActionFlags::JUMP);
            self.next_jump += JUMP_PERIOD;
        }

        self.owner_clock.advance(dt, &mut self.owner)?;
        for sample in self.owner.outbox.drain(..) {
            send(&mut self.uplink, now, Message::Input(sample))?;
        }

        for message in receive(&mut self.uplink, now, &mut self.undecodable) {
            if let Message::Input(sample) = message {
                self.server.motor.receive_input(sample);
            }
        }

        self.server_clock.advance(dt, &mut self.server)?;
        for reply in self.server.replies.drain(..) {
            let message = match reply {
                ServerReply::Snapshot(snapshot) => Message::Snapshot(snapshot),
                ServerReply::Timing(hint) => Message::Timing(hint),
            };
            send(&mut self.downlink, now, message)?;
        }
        for pose in self.server.poses.drain(..) {
            send(&mut self.poselink, now, Message::Pose(pose))?;
        }

        for message in receive(&mut self.downlink, now, &mut self.undecodable) {
            match message {
                Message::Snapshot(snapshot) => {
                    self.owner.motor.receive_snapshot(snapshot);
                }
                Message::Timing(hint) => self.owner.motor.receive_timing(hint),
                other => log::debug!("owner ignoring {other:?}"),
            }
        }

        let observer = &mut self.observer;
        for message in receive(&mut self.poselink, now, &mut self.undecodable) {
            if let Message::Pose(update) = message {
                observer.estimator.receive(&update, now, &observer.displayed);
            }
        }
        self.observer_clock.advance(dt, observer)?;
        observer.displayed = observer.estimator.extrapolate(now, dt, &observer.displayed);
        observer.physics.set_pose(observer.proxy, observer.displayed.pose());

        Ok(())
    }

    pub fn report(&self) -> Result<Report> {
        let owner_body = self.owner.motor.body();
        let server_body = self.server.motor.body();
        let owner_pose = self
            .owner
            .physics
            .pose(owner_body)
            .ok_or(motor::Error::MissingBody(owner_body))?;
        let server_pose = self
            .server
            .physics
            .pose(server_body)
            .ok_or(motor::Error::MissingBody(server_body))?;

        Ok(Report {
            time: self.now,
            owner_tick: self.owner_clock.tick(),
            server_tick: self.server_clock.tick(),
            adjusted_tick: self.owner_clock.adjusted_tick_duration(),
            buffered: self.owner.motor.buffer().len(),
            queued: self.server.motor.queue().len(),
            owner_lead: owner_pose.position.distance(server_pose.position),
            observer_error: self.observer.displayed.position.distance(server_pose.position),
        })
    }

    pub fn summary(&self) -> Summary {
        Summary {
            uplink: self.uplink.stats(),
            downlink: self.downlink.stats(),
            poselink: self.poselink.stats(),
            evicted_inputs: self.server.motor.queue().evicted(),
            undecodable: self.undecodable,
        }
    }
}

fn owner_clock(config: ClockConfig) -> FixedClock<OwnerPeer> {
    let mut clock = FixedClock::new(config);
    clock.subscribe(Phase::Pre, |peer: &mut OwnerPeer, ctx| {
        peer.motor.reconcile(ctx.clock_mut(), &mut peer.physics)?;
        Ok(())
    });
    clock.subscribe(Phase::Step, |peer: &mut OwnerPeer, ctx| {
        let sample = peer.motor.step(ctx.clock(), &mut peer.physics)?;
        peer.outbox.push(sample);
        Ok(())
    });
    clock
}

fn server_clock(config: ClockConfig) -> FixedClock<ServerPeer> {
    let mut clock = FixedClock::new(config);
    clock.subscribe(Phase::Step, |peer: &mut ServerPeer, _| {
        peer.motor.step(&mut peer.physics)
    });
    clock.subscribe(Phase::Post, |peer: &mut ServerPeer, ctx| {
        if let Some(reply) = peer.motor.finish(&peer.physics)? {
            peer.replies.push(reply);
        }

        let body = peer.motor.body();
        let pose = peer
            .physics
            .pose(body)
            .ok_or(motor::Error::MissingBody(body))?;
        if let Some(update) = peer
            .emitter
            .poll(ctx.clock().real_time(), &Transform::from_pose(pose))
        {
            peer.poses.push(update);
        }
        Ok(())
    });
    clock
}

fn observer_clock(config: ClockConfig) -> FixedClock<ObserverPeer> {
    let mut clock = FixedClock::new(config);
    clock.subscribe(Phase::Pre, |peer: &mut ObserverPeer, _| {
        cancel_velocity(&mut peer.physics, peer.proxy, peer.cancel)
    });
    clock
}

fn send(link: &mut LossyLink<Vec<u8>>, now: f64, message: Message) -> Result<()> {
    let bytes = Packet::new(ENTITY_ID, message).serialize()?;
    link.send(now, bytes);
    Ok(())
}

fn receive(link: &mut LossyLink<Vec<u8>>, now: f64, undecodable: &mut u64) -> Vec<Message> {
    link.receive(now)
        .into_iter()
        .filter_map(|bytes| match Packet::deserialize(&bytes) {
            Ok(packet) if packet.entity_id == ENTITY_ID => Some(packet.payload),
            Ok(packet) => {
                log::debug!("packet for unknown entity {}", packet.entity_id);
                None
            }
            Err(e) => {
                *undecodable += 1;
                log::warn!("{e}");
                None
            }
        })
        .collect()
}
