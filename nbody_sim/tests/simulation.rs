use glam::{DVec2, Vec2};
use nbody_sim::{
    pairwise_force, select_backend, Backend, Body, BodyStore, CpuBackend, ForceIntegrator,
    FrameDriver, FrameState, SimulationConfig, StepBackend, G,
};

/// Two bodies of equal mass mirrored through `center`
pub fn mirrored_pair(center: DVec2, offset: DVec2, mass: f64) -> BodyStore {
    BodyStore::new(vec![
        Body::new(mass, center - offset).unwrap(),
        Body::new(mass, center + offset).unwrap(),
    ])
}

/// Step a copy of `store` `steps` times on the host
pub fn run_cpu(store: &BodyStore, steps: usize) -> BodyStore {
    let mut store = store.clone();
    let mut integrator = ForceIntegrator::new(G);
    for _ in 0..steps {
        integrator.step(&mut store);
    }
    store
}

pub fn total_momentum(store: &BodyStore) -> DVec2 {
    store.iter().map(|b| b.velocity_delta() * b.mass()).sum()
}

// ==================================================================================
// Integrator
// ==================================================================================

#[test]
fn lone_body_stays_put() {
    let store = BodyStore::new(vec![Body::new(500.0, DVec2::new(952.0, 535.0)).unwrap()]);
    let after = run_cpu(&store, 10);

    let body = after.get(0).unwrap();
    assert_eq!(body.velocity_delta(), DVec2::ZERO);
    assert_eq!(body.position(), DVec2::new(952.0, 535.0));
}

#[test]
fn mirrored_pair_moves_symmetrically() {
    let center = DVec2::new(500.0, 500.0);
    let store = mirrored_pair(center, DVec2::new(30.0, -40.0), 750.0);
    let after = run_cpu(&store, 1);

    let v0 = after.get(0).unwrap().velocity_delta();
    let v1 = after.get(1).unwrap().velocity_delta();
    assert_eq!(v0, -v1);
    assert!(v0.length() > 0.0);

    // centre of mass does not move
    let mid = (after.get(0).unwrap().position() + after.get(1).unwrap().position()) / 2.0;
    assert!((mid - center).length() < 1e-9, "centre drifted to {:?}", mid);
}

#[test]
fn pairwise_forces_cancel_across_random_layout() {
    let store = BodyStore::random(40, 1904, 1071, 500);
    let bodies = store.bodies();

    for (i, a) in bodies.iter().enumerate() {
        for b in &bodies[i + 1..] {
            assert_eq!(pairwise_force(G, a, b), -pairwise_force(G, b, a));
        }
    }
}

#[test]
fn momentum_is_conserved_from_rest() {
    let store = BodyStore::random(200, 1904, 1071, 7);
    let after = run_cpu(&store, 3);

    let p = total_momentum(&after);
    assert!(p.length() < 1e-6, "net momentum not zero: {:?}", p);
}

#[test]
fn stacked_bodies_stay_finite() {
    let store = BodyStore::new(vec![
        Body::new(999.0, DVec2::new(100.0, 100.0)).unwrap(),
        Body::new(999.0, DVec2::new(100.0, 100.0)).unwrap(),
        Body::new(999.0, DVec2::new(100.0, 100.0)).unwrap(),
    ]);
    let after = run_cpu(&store, 5);

    for body in after.iter() {
        assert!(body.velocity_delta().is_finite());
        assert!(body.position().is_finite());
    }
}

#[test]
fn masses_survive_many_steps() {
    let store = BodyStore::random(64, 800, 600, 3);
    let after = run_cpu(&store, 25);

    let before: Vec<f64> = store.iter().map(Body::mass).collect();
    let now: Vec<f64> = after.iter().map(Body::mass).collect();
    assert_eq!(before, now);
}

#[test]
fn repeated_runs_are_bit_identical() {
    let store = BodyStore::random(150, 1904, 1071, 500);
    assert_eq!(run_cpu(&store, 20), run_cpu(&store, 20));
}

// ==================================================================================
// Frame driver
// ==================================================================================

#[test]
fn driver_snapshots_follow_cpu_store() {
    let store = BodyStore::random(50, 1024, 768, 11);
    let mut driver = FrameDriver::new(CpuBackend::new(store.clone(), G));

    for step in 1..=4 {
        let published = driver.advance().unwrap().clone();

        let mut expected = vec![Vec2::ZERO; store.len()];
        run_cpu(&store, step).write_positions(&mut expected);
        assert_eq!(published.positions(), expected.as_slice());
    }
    assert_eq!(driver.state(), FrameState::Ready);
    assert_eq!(driver.timings().steps, 4);
}

#[test]
fn headless_checksums_repeat() {
    let config = SimulationConfig {
        body_count: 300,
        ..Default::default()
    };

    let checksum = || {
        let mut driver = FrameDriver::new(select_backend(&config, None).unwrap());
        for _ in 0..10 {
            driver.advance().unwrap();
        }
        driver.ready_snapshot().unwrap().checksum()
    };

    assert_eq!(checksum(), checksum());
}

#[test]
fn default_cpu_config_selects_cpu() {
    let config = SimulationConfig::for_backend(Backend::Cpu);
    let backend = select_backend(&config, None).unwrap();

    assert_eq!(backend.label(), "cpu");
    assert_eq!(backend.body_count(), config.body_count);
}
