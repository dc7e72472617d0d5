//! End-to-end transport scenarios with exact, hand-computable outcomes.

use phonon3d::sim::engine::sensors::SensorGeometry;
use phonon3d::sim::engine::walls::WallBox;
use phonon3d::sim::velocity::FieldConfig;
use phonon3d::{
    Branch, Particle, ParticleBatch, Point, SensorPanel, Simulation, SimulationConfig, Transport,
    Vector,
};

const CUBE: [f64; 3] = [0.05; 3];

fn engine_with(panels: Vec<SensorPanel>) -> Transport {
    Transport::new(
        WallBox::new(CUBE),
        SensorGeometry::new(panels, CUBE).unwrap(),
        10_000,
    )
}

fn full_plus_y_face() -> SensorPanel {
    SensorPanel::new(Point::new(0.0, 0.05, 0.0), [0.05, 0.0, 0.05])
}

fn single_particle(velocity: Vector) -> ParticleBatch {
    ParticleBatch::from_particles(vec![Particle {
        position: Point::new(0.0, 0.0, 0.0),
        velocity,
        branch: Branch::SlowTransverse,
        frequency: 5e10,
    }])
}

#[test]
fn particle_toward_sensor_absorbed_without_reflection() {
    // Sensor over the whole +y face, velocity (0, v, 0): absorbed at
    // t = 0.05 / v at position (0, 0.05, 0).
    let v = 4200.0;
    let engine = engine_with(vec![full_plus_y_face()]);
    let mut batch = single_particle(Vector::new(0.0, v, 0.0));
    let mut events = Vec::new();

    engine.advance_frame(&mut batch, 0.0, 1e-4, &mut events).unwrap();

    assert_eq!(events.len(), 1);
    assert!((events[0].time - 0.05 / v).abs() < 1e-14);
    assert!(events[0].position.is_close(&Point::new(0.0, 0.05, 0.0)));
    assert_eq!(events[0].branch, Branch::SlowTransverse);
    assert!(batch.is_empty());
}

#[test]
fn particle_away_from_sensor_reflects_once_then_absorbed() {
    // Velocity (0, -v, 0): 0.05/v to the -y wall, reflect, then 0.10/v back
    // across to the +y sensor face. Total 0.15 / v.
    let v = 4200.0;
    let engine = engine_with(vec![full_plus_y_face()]);
    let mut batch = single_particle(Vector::new(0.0, -v, 0.0));
    let mut events = Vec::new();

    engine.advance_frame(&mut batch, 0.0, 1e-4, &mut events).unwrap();

    assert_eq!(events.len(), 1);
    assert!((events[0].time - 0.15 / v).abs() < 1e-12);
    assert!(events[0].position.is_close(&Point::new(0.0, 0.05, 0.0)));
}

#[test]
fn absorption_spans_frames_with_correct_global_time() {
    // Same reflecting trajectory but resolved over many short frames: the
    // logged time is global, not frame-local.
    let v = 4200.0;
    let engine = engine_with(vec![full_plus_y_face()]);
    let mut batch = single_particle(Vector::new(0.0, -v, 0.0));
    let mut events = Vec::new();

    let dt = 1e-6;
    for frame in 0..100 {
        engine
            .advance_frame(&mut batch, frame as f64 * dt, dt, &mut events)
            .unwrap();
        if batch.is_empty() {
            break;
        }
    }

    assert_eq!(events.len(), 1);
    assert!((events[0].time - 0.15 / v).abs() < 1e-10);
}

#[test]
fn no_sensors_means_no_absorption_ever() {
    let engine = engine_with(vec![]);
    let v0 = Vector::new(2500.0, -3100.0, 1700.0);
    let speed0 = v0.length();
    let mut batch = single_particle(v0);
    let mut events = Vec::new();

    for frame in 0..1000 {
        engine
            .advance_frame(&mut batch, frame as f64 * 1e-6, 1e-6, &mut events)
            .unwrap();
    }

    assert!(events.is_empty());
    assert_eq!(batch.live_count(), 1);
    // Speed is preserved through every reflection
    assert!((batch.particles[0].velocity.length() - speed0).abs() < 1e-9 * speed0);
}

#[test]
fn corner_strike_reverses_both_components() {
    let engine = engine_with(vec![]);
    let mut batch = single_particle(Vector::new(1000.0, 1000.0, 0.0));
    let mut events = Vec::new();

    // Reaches the (+x, +y) edge at t = 5e-5; after the bounce both
    // components are negated.
    engine.advance_frame(&mut batch, 0.0, 6e-5, &mut events).unwrap();

    let p = &batch.particles[0];
    assert!(p.velocity.dx < 0.0);
    assert!(p.velocity.dy < 0.0);
    assert_eq!(p.velocity.dz, 0.0);
}

#[test]
fn full_simulation_with_sensor_face_absorbs_and_orders_events() {
    let config = SimulationConfig {
        temperature: Some(2.0),
        field: FieldConfig {
            n_azimuth: 48,
            n_polar: 13,
            ..FieldConfig::new()
        },
        num_particles: 200,
        num_frames: 3000,
        dt: 1e-6,
        sensors: vec![full_plus_y_face()],
        ..SimulationConfig::new()
    };

    let result = Simulation::new(config).unwrap().run().unwrap();

    assert!(!result.events.is_empty());
    assert_eq!(result.live_remaining + result.events.len(), 200);

    // One event per particle, frames processed in order, so the log can
    // only step backwards within a single frame's worth of time.
    for pair in result.events.windows(2) {
        assert!(pair[1].time >= pair[0].time - 1e-6);
    }

    // All sampled frequencies are inside the configured spectrum
    for event in &result.events {
        assert!(event.frequency >= result.config.spectrum.freq_min);
        assert!(event.frequency <= result.config.spectrum.freq_max);
    }
}

#[test]
fn six_covered_faces_leave_no_survivors() {
    let sensors = vec![
        SensorPanel::new(Point::new(0.05, 0.0, 0.0), [0.0, 0.05, 0.05]),
        SensorPanel::new(Point::new(-0.05, 0.0, 0.0), [0.0, 0.05, 0.05]),
        SensorPanel::new(Point::new(0.0, 0.05, 0.0), [0.05, 0.0, 0.05]),
        SensorPanel::new(Point::new(0.0, -0.05, 0.0), [0.05, 0.0, 0.05]),
        SensorPanel::new(Point::new(0.0, 0.0, 0.05), [0.05, 0.05, 0.0]),
        SensorPanel::new(Point::new(0.0, 0.0, -0.05), [0.05, 0.05, 0.0]),
    ];
    let config = SimulationConfig {
        temperature: Some(2.0),
        field: FieldConfig {
            n_azimuth: 48,
            n_polar: 13,
            ..FieldConfig::new()
        },
        num_particles: 100,
        num_frames: 2000,
        dt: 1e-6,
        sensors,
        ..SimulationConfig::new()
    };

    let result = Simulation::new(config).unwrap().run().unwrap();

    assert_eq!(result.live_remaining, 0);
    assert_eq!(result.events.len(), 100);
    assert_eq!(result.hits_per_sensor().iter().sum::<usize>(), 100);
}
