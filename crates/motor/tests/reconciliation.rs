use glam::Vec3;

use motor::clock::ManualStep;
use motor::{
    ClockConfig, ClockState, FixedClock, InputSample, LinkConditions, LossyLink, Message,
    MotorConfig, OwnerMotor, Packet, Phase, PhysicsConfig, PhysicsEngine, PhysicsWorld,
    PoseEmitter, RemoteStateEstimator, ServerMotor, ServerPolicy, ServerReply, Transform,
};

const DT: f32 = 1.0 / 60.0;
const ENTITY: u32 = 1;

fn fast_motor() -> MotorConfig {
    MotorConfig {
        move_rate: 60.0,
        jump_impulse: 0.0,
        ..MotorConfig::default()
    }
}

fn world_with_body() -> (PhysicsWorld, motor::BodyId) {
    let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
    let body = world.add_dynamic_sphere(Vec3::ZERO, 0.5, 1.0);
    (world, body)
}

fn wire(packet: Packet) -> Packet {
    let bytes = packet.serialize().unwrap();
    Packet::deserialize(&bytes).unwrap()
}

#[test]
fn test_tick_ten_round_trip() {
    let (mut owner_world, owner_body) = world_with_body();
    let (mut server_world, server_body) = world_with_body();

    let mut owner = OwnerMotor::bind(&owner_world, owner_body, fast_motor()).unwrap();
    let mut server =
        ServerMotor::bind(&server_world, server_body, fast_motor(), ServerPolicy::default())
            .unwrap();
    let mut owner_clock = ClockState::new(ClockConfig::default());
    let nominal = owner_clock.nominal_tick_duration();

    // Owner, tick 10: move right.
    owner_clock.set_tick(10);
    owner.input_mut().set_axes(1.0, 0.0);
    let sent = owner.step(&owner_clock, &mut owner_world).unwrap();
    owner_world.manual_step(DT);
    assert_eq!(sent, InputSample::new(10, 1.0, 0.0, Default::default()));

    // Owner, tick 11: let go.
    owner_clock.set_tick(11);
    owner.input_mut().set_axes(0.0, 0.0);
    owner.step(&owner_clock, &mut owner_world).unwrap();
    owner_world.manual_step(DT);

    // Server, tick 11: consume the tick 10 input from an otherwise empty queue.
    assert!(server.receive_input(sent));
    server.step(&mut server_world).unwrap();
    server_world.manual_step(DT);
    let Some(ServerReply::Snapshot(snapshot)) = server.finish(&server_world).unwrap() else {
        panic!("server should answer a consumed input with a snapshot");
    };

    assert_eq!(snapshot.tick, 10);
    assert_eq!(snapshot.timing_step, -1);
    assert!((Vec3::from(snapshot.position) - Vec3::X).length() < 1e-4);

    // Owner, tick 12 pre phase.
    assert!(owner.receive_snapshot(snapshot));
    owner_clock.set_tick(12);
    let replayed = owner.reconcile(&mut owner_clock, &mut owner_world).unwrap();

    assert_eq!(replayed, 1);
    assert_eq!(owner.buffer().front().map(|s| s.tick), Some(11));
    let expected = nominal - owner_clock.per_step_delta();
    assert!((owner_clock.adjusted_tick_duration() - expected).abs() < 1e-7);

    let pose = owner_world.pose(owner_body).unwrap();
    assert!((pose.position - Vec3::X).length() < 1e-4);
}

#[test]
fn test_redelivered_snapshot_has_no_effect() {
    let (mut owner_world, owner_body) = world_with_body();
    let (mut server_world, server_body) = world_with_body();
    let mut owner = OwnerMotor::bind(&owner_world, owner_body, fast_motor()).unwrap();
    let mut server =
        ServerMotor::bind(&server_world, server_body, fast_motor(), ServerPolicy::default())
            .unwrap();
    let mut clock = ClockState::new(ClockConfig::default());

    owner.input_mut().set_axes(0.0, 1.0);
    let sent = owner.step(&clock, &mut owner_world).unwrap();
    owner_world.manual_step(DT);

    server.receive_input(sent);
    server.step(&mut server_world).unwrap();
    server_world.manual_step(DT);
    let Some(ServerReply::Snapshot(snapshot)) = server.finish(&server_world).unwrap() else {
        panic!("expected snapshot");
    };

    assert!(owner.receive_snapshot(snapshot));
    owner.reconcile(&mut clock, &mut owner_world).unwrap();
    let state = owner_world.body_state(owner_body).unwrap();
    let duration = clock.adjusted_tick_duration();

    assert!(!owner.receive_snapshot(snapshot));
    owner.reconcile(&mut clock, &mut owner_world).unwrap();

    assert_eq!(owner_world.body_state(owner_body).unwrap(), state);
    assert_eq!(clock.adjusted_tick_duration(), duration);
}

struct ClientSide {
    physics: PhysicsWorld,
    motor: OwnerMotor,
    outbox: Vec<InputSample>,
}

impl ManualStep for ClientSide {
    fn manual_step(&mut self, dt: f32) {
        self.physics.manual_step(dt);
    }
}

struct ServerSide {
    physics: PhysicsWorld,
    motor: ServerMotor,
    outbox: Vec<ServerReply>,
}

impl ManualStep for ServerSide {
    fn manual_step(&mut self, dt: f32) {
        self.physics.manual_step(dt);
    }
}

fn client_clock() -> FixedClock<ClientSide> {
    let mut clock = FixedClock::new(ClockConfig::default());
    clock.subscribe(Phase::Pre, |side: &mut ClientSide, ctx| {
        side.motor.reconcile(ctx.clock_mut(), &mut side.physics)?;
        Ok(())
    });
    clock.subscribe(Phase::Step, |side: &mut ClientSide, ctx| {
        let sample = side.motor.step(ctx.clock(), &mut side.physics)?;
        side.outbox.push(sample);
        Ok(())
    });
    clock
}

fn server_clock() -> FixedClock<ServerSide> {
    let mut clock = FixedClock::new(ClockConfig::default());
    clock.subscribe(Phase::Step, |side: &mut ServerSide, _| side.motor.step(&mut side.physics));
    clock.subscribe(Phase::Post, |side: &mut ServerSide, _| {
        if let Some(reply) = side.motor.finish(&side.physics)? {
            side.outbox.push(reply);
        }
        Ok(())
    });
    clock
}

#[test]
fn test_prediction_converges_over_lossy_link() {
    let (physics, body) = world_with_body();
    let motor = OwnerMotor::bind(&physics, body, MotorConfig::default()).unwrap();
    let mut client = ClientSide {
        physics,
        motor,
        outbox: Vec::new(),
    };

    let (physics, body) = world_with_body();
    let motor = ServerMotor::bind(&physics, body, MotorConfig::default(), ServerPolicy::default())
        .unwrap();
    let mut server = ServerSide {
        physics,
        motor,
        outbox: Vec::new(),
    };

    let conditions = LinkConditions {
        loss_percent: 10.0,
        min_latency: 0.03,
        max_latency: 0.06,
        jitter: 0.01,
    };
    let mut uplink = LossyLink::new(conditions.clone(), 1);
    let mut downlink = LossyLink::new(conditions, 2);

    let mut client_clock = client_clock();
    let mut server_clock = server_clock();
    let mut now = 0.0_f64;

    for frame in 0..600 {
        let axes = if frame < 300 { (1.0, 1.0) } else { (0.0, 0.0) };
        client.motor.input_mut().set_axes(axes.0, axes.1);

        now += f64::from(DT);
        client_clock.advance(DT, &mut client).unwrap();
        for sample in client.outbox.drain(..) {
            uplink.send(now, wire(Packet::new(ENTITY, Message::Input(sample))));
        }

        for packet in uplink.receive(now) {
            if let Message::Input(sample) = packet.payload {
                server.motor.receive_input(sample);
            }
        }

        server_clock.advance(DT, &mut server).unwrap();
        for reply in server.outbox.drain(..) {
            let payload = match reply {
                ServerReply::Snapshot(snapshot) => Message::Snapshot(snapshot),
                ServerReply::Timing(hint) => Message::Timing(hint),
            };
            downlink.send(now, wire(Packet::new(ENTITY, payload)));
        }

        for packet in downlink.receive(now) {
            match packet.payload {
                Message::Snapshot(snapshot) => {
                    client.motor.receive_snapshot(snapshot);
                }
                Message::Timing(hint) => client.motor.receive_timing(hint),
                _ => {}
            }
        }

        let (min, max) = client_clock.state().duration_range();
        let adjusted = client_clock.adjusted_tick_duration();
        assert!(adjusted >= min && adjusted <= max);
    }

    assert!(uplink.stats().dropped > 0);
    assert!(client.motor.last_snapshot_tick().is_some());

    let client_pose = client.physics.pose(client.motor.body()).unwrap();
    let server_pose = server.physics.pose(server.motor.body()).unwrap();
    assert!(server_pose.position.x > 1.0);
    assert!(
        client_pose.position.distance(server_pose.position) < 1e-3,
        "client {:?} server {:?}",
        client_pose.position,
        server_pose.position
    );
}

#[test]
fn test_observer_follows_emitted_poses() {
    let (mut server_world, body) = world_with_body();
    server_world.set_velocities(
        body,
        motor::Velocities {
            linear: Vec3::new(2.0, 0.0, -1.0),
            angular: Vec3::ZERO,
        },
    );

    let mut emitter = PoseEmitter::default();
    let mut estimator = RemoteStateEstimator::default();
    let mut link = LossyLink::new(LinkConditions::fixed_latency(0.05), 3);
    let mut displayed = Transform::IDENTITY;
    let mut now = 0.0_f64;

    for frame in 0..240 {
        if frame == 120 {
            server_world.set_velocities(body, motor::Velocities::ZERO);
        }
        server_world.manual_step(DT);
        now += f64::from(DT);

        let authority = Transform::from_pose(server_world.pose(body).unwrap());
        if frame % 6 == 0 {
            if let Some(update) = emitter.poll(now, &authority) {
                link.send(now, Packet::new(ENTITY, Message::Pose(update)));
            }
        }

        for packet in link.receive(now) {
            if let Message::Pose(update) = packet.payload {
                estimator.receive(&update, now, &displayed);
            }
        }
        displayed = estimator.extrapolate(now, DT, &displayed);
    }

    let target = server_world.pose(body).unwrap().position;
    assert!(
        displayed.position.distance(target) < 0.05,
        "displayed {:?} target {:?}",
        displayed.position,
        target
    );
}
