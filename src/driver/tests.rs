#[cfg(test)]
mod units {
    use crate::driver::batched::BatchedDriver;
    use crate::driver::prescan::{Tuning, derive_tuning, run_prescan};
    use crate::driver::{Driver, ParticleStore};
    use crate::geometry::{Scene, Triangle};
    use crate::particle::{Particle, VACUUM};
    use crate::pool::WorkPool;
    use crate::scatter::{EventKind, FreeFlight, PhysicsModel};
    use crate::vector::Vec3;
    use rand::Rng;

    /// An xy-plane square at height `z` made of two triangles, normals up.
    fn square(z: f32, material_in: i32, material_out: i32, detector: bool) -> Vec<Triangle> {
        let half = 50.0;
        let a = Vec3::new(-half, -half, z);
        let b = Vec3::new(half, -half, z);
        let c = Vec3::new(half, half, z);
        let d = Vec3::new(-half, half, z);
        let mut triangles = vec![
            Triangle::new(a, b, c, material_in, material_out),
            Triangle::new(a, c, d, material_in, material_out),
        ];
        if detector {
            for t in &mut triangles {
                t.detector = true;
            }
        }
        triangles
    }

    fn detector_scene() -> Scene {
        Scene::new(square(1.0, VACUUM, VACUUM, true))
    }

    fn beam(n: usize, energy: f32) -> (Vec<Particle>, Vec<u32>) {
        let particles = (0..n)
            .map(|i| {
                Particle::new(
                    Vec3::new(i as f32 * 0.01, 0.0, 0.0),
                    Vec3::z_hat(),
                    energy,
                )
            })
            .collect();
        (particles, (0..n as u32).collect())
    }

    /// No bulk events anywhere: electrons fly straight until a boundary.
    struct Ballistic;
    impl PhysicsModel for Ballistic {
        fn free_flight<R: Rng>(&self, _m: i32, _e: f32, _rng: &mut R) -> Option<FreeFlight> {
            None
        }
        fn scatter<R: Rng>(&self, _k: EventKind, _p: &mut Particle, _r: &mut R) -> Option<Particle> {
            None
        }
        fn barrier(&self, _m: i32) -> f32 {
            0.0
        }
    }

    /// Ballistic flight but with a vacuum barrier on material 0.
    struct Barrier(f32);
    impl PhysicsModel for Barrier {
        fn free_flight<R: Rng>(&self, _m: i32, _e: f32, _rng: &mut R) -> Option<FreeFlight> {
            None
        }
        fn scatter<R: Rng>(&self, _k: EventKind, _p: &mut Particle, _r: &mut R) -> Option<Particle> {
            None
        }
        fn barrier(&self, material: i32) -> f32 {
            if material == 0 { self.0 } else { 0.0 }
        }
    }

    /// Every bulk event absorbs the electron on the spot.
    struct Absorb;
    impl PhysicsModel for Absorb {
        fn free_flight<R: Rng>(&self, material: i32, _e: f32, _rng: &mut R) -> Option<FreeFlight> {
            (material != VACUUM).then_some(FreeFlight {
                distance: 1e-3,
                kind: EventKind::Inelastic,
            })
        }
        fn scatter<R: Rng>(&self, _k: EventKind, p: &mut Particle, _r: &mut R) -> Option<Particle> {
            p.energy = 0.0;
            None
        }
        fn barrier(&self, _m: i32) -> f32 {
            0.0
        }
    }

    /// Deterministic cascade: each event costs 1 eV, and the very first
    /// event of a 10 eV electron spawns one 3 eV secondary.
    struct Cascade;
    impl PhysicsModel for Cascade {
        fn free_flight<R: Rng>(&self, material: i32, _e: f32, _rng: &mut R) -> Option<FreeFlight> {
            (material != VACUUM).then_some(FreeFlight {
                distance: 1e-4,
                kind: EventKind::Inelastic,
            })
        }
        fn scatter<R: Rng>(&self, _k: EventKind, p: &mut Particle, _r: &mut R) -> Option<Particle> {
            p.energy -= 1.0;
            (p.energy == 9.0).then_some(Particle {
                position: p.position,
                direction: p.direction,
                energy: 3.0,
                material: p.material,
            })
        }
        fn barrier(&self, _m: i32) -> f32 {
            0.0
        }
    }

    /// Electrons inside a slab of material 0, far from any surface.
    fn embedded(n: usize, energy: f32) -> (Vec<Particle>, Vec<u32>) {
        let (mut particles, tags) = beam(n, energy);
        for p in &mut particles {
            p.material = 0;
        }
        (particles, tags)
    }

    #[test]
    fn push_clamps_to_capacity_and_counts() {
        let mut store = ParticleStore::new(4);
        let (particles, tags) = beam(6, 100.0);
        assert_eq!(store.push(&particles, &tags), 4);
        assert_eq!(store.running(), 4);
        assert_eq!(store.free(), 0);
        // A full slab accepts nothing further
        assert_eq!(store.push(&particles[4..], &tags[4..]), 0);
    }

    #[test]
    fn zero_capacity_store_accepts_nothing() {
        let mut store = ParticleStore::new(0);
        let (particles, tags) = beam(1, 100.0);
        assert_eq!(store.push(&particles, &tags), 0);
    }

    #[test]
    fn ballistic_beam_is_detected_with_its_tags() {
        let scene = detector_scene();
        let physics = Ballistic;
        let mut driver = Driver::new(16, &scene, &physics, 0.0, 1);
        let (particles, tags) = beam(5, 300.0);
        assert_eq!(driver.push(&particles, &tags), 5);

        driver.do_iteration();
        assert_eq!(driver.get_running_count(), 0);
        assert_eq!(driver.get_detected_count(), 5);

        let mut seen = Vec::new();
        let running = driver.flush_detected(|p, tag| {
            assert!((p.position.z - 1.0).abs() < 1e-4);
            assert_eq!(p.energy, 300.0);
            seen.push(tag);
        });
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(running, 0);
        // Flushing always leaves zero pending records
        assert_eq!(driver.get_detected_count(), 0);
    }

    #[test]
    fn ballistic_miss_leaves_the_domain() {
        let scene = detector_scene();
        let physics = Ballistic;
        let mut driver = Driver::new(4, &scene, &physics, 0.0, 1);
        let miss = Particle::new(Vec3::new(200.0, 0.0, 0.0), Vec3::z_hat(), 50.0);
        driver.push(&[miss], &[0]);
        driver.do_iteration();
        assert_eq!(driver.get_running_count(), 0);
        assert_eq!(driver.get_detected_count(), 0);
    }

    #[test]
    fn absorbing_medium_terminates_everything() {
        let scene = Scene::new(square(1000.0, VACUUM, VACUUM, false));
        let physics = Absorb;
        let mut driver = Driver::new(32, &scene, &physics, 50.0, 1);
        let (particles, tags) = embedded(10, 500.0);
        driver.push(&particles, &tags);

        driver.do_iteration();
        assert_eq!(driver.get_running_count(), 0);
        assert_eq!(driver.get_detected_count(), 0);
    }

    #[test]
    fn sub_barrier_electron_reflects_at_vacuum_boundary() {
        // Upward-facing square with material 0 below it
        let scene = Scene::new(square(1.0, 0, VACUUM, false));
        let physics = Barrier(5.0);
        let mut driver = Driver::new(4, &scene, &physics, 0.0, 1);
        let mut p = Particle::new(Vec3::zero(), Vec3::z_hat(), 3.0);
        p.material = 0;
        driver.push(&[p], &[0]);

        driver.do_iteration();
        assert_eq!(driver.get_running_count(), 1);
        let mut direction = None;
        let mut store_probe = |p: &Particle, _tag: u32| direction = Some(p.direction);
        // Nothing detected; probe the direction through another iteration's
        // exit instead: the reflected electron flies down and leaves.
        driver.flush_detected(&mut store_probe);
        assert!(direction.is_none());
        driver.do_iteration();
        assert_eq!(driver.get_running_count(), 0);
    }

    #[test]
    fn cascade_secondaries_inherit_the_parent_tag() {
        let scene = Scene::new(square(1000.0, VACUUM, VACUUM, true));
        let physics = Cascade;
        let mut driver = Driver::new(8, &scene, &physics, 0.5, 1);
        let (particles, _tags) = embedded(1, 10.0);
        driver.push(&particles, &[7]);

        driver.do_iteration();
        // Parent at 9 eV plus the spawned 3 eV secondary
        assert_eq!(driver.get_running_count(), 2);
        for _ in 0..20 {
            driver.do_iteration();
        }
        assert_eq!(driver.get_running_count(), 0);
    }

    #[test]
    fn capacity_bounds_hold_through_a_cascade() {
        let scene = Scene::new(square(1000.0, VACUUM, VACUUM, false));
        let physics = Cascade;
        let capacity = 12;
        let mut driver = Driver::new(capacity, &scene, &physics, 0.5, 1);
        let (particles, tags) = embedded(10, 10.0);
        driver.push(&particles, &tags);

        for _ in 0..25 {
            driver.do_iteration();
            let occupancy = driver.get_running_count() + driver.get_detected_count();
            assert!(occupancy as usize <= capacity);
        }
        assert_eq!(driver.get_running_count(), 0);
    }

    #[test]
    fn derive_tuning_matches_the_accumulator_formula() {
        let samples = [(4, 0), (6, 1), (2, 3), (1, 4), (0, 5)];
        // Peak at index 1 -> frame 2; A = 2*(2/4) + 2*(3/4) + running[4]/4
        let tuning = derive_tuning(&samples, 4, 100, 0.9);
        assert_eq!(
            tuning,
            Tuning {
                frame_size: 2,
                batch_size: 36
            }
        );
    }

    #[test]
    fn derive_tuning_clamps_degenerate_profiles() {
        // Pilot died instantly and undetected: accumulator is zero
        let tuning = derive_tuning(&[(8, 0), (0, 0)], 8, 64, 0.9);
        assert_eq!(tuning.frame_size, 1);
        assert_eq!(tuning.batch_size, 64);

        let empty = derive_tuning(&[], 0, 64, 0.9);
        assert_eq!(empty.frame_size, 1);
    }

    #[test]
    fn prescan_is_deterministic_for_fixed_stub_physics() {
        let scene = Scene::new(square(1000.0, VACUUM, VACUUM, false));
        let physics = Cascade;
        let mut driver = BatchedDriver::new(700, &scene, &physics, 0.5, 9);
        let (particles, tags) = embedded(10, 10.0);
        let pool = WorkPool::new(&particles, &tags);

        let tuning = run_prescan(&mut driver, &pool, 10, 0.9);
        // Profile: P, 2P x3, P x6, 0 -> peak index 1, A = 4 + 3
        assert_eq!(
            tuning,
            Tuning {
                frame_size: 2,
                batch_size: 90
            }
        );
        assert!(pool.done());
    }

    #[test]
    fn batched_staging_round_trip() {
        let scene = detector_scene();
        let physics = Ballistic;
        let mut driver = BatchedDriver::new(4, &scene, &physics, 0.0, 3);
        driver.allocate_input_buffers(3);

        let (particles, tags) = beam(10, 100.0);
        let pool = WorkPool::new(&particles, &tags);

        driver.push_to_buffer(&pool);
        assert_eq!(driver.staged_input(), 3);
        assert_eq!(driver.get_running_count(), 0);

        assert_eq!(driver.push_to_simulation(), 3);
        assert_eq!(driver.staged_input(), 0);
        assert_eq!(driver.get_running_count(), 3);

        driver.do_iteration();
        assert_eq!(driver.get_detected_count(), 3);

        driver.buffer_detected();
        assert_eq!(driver.get_detected_count(), 0);
        let mut tags_seen = Vec::new();
        assert_eq!(driver.flush_buffered(|_, tag| tags_seen.push(tag)), 3);
        assert_eq!(tags_seen, vec![0, 1, 2]);
    }

    #[test]
    fn staging_never_claims_more_than_free_slots() {
        let scene = detector_scene();
        let physics = Ballistic;
        let mut driver = BatchedDriver::new(4, &scene, &physics, 0.0, 3);
        driver.allocate_input_buffers(100);

        let (particles, tags) = beam(10, 100.0);
        let pool = WorkPool::new(&particles, &tags);

        driver.push_to_buffer(&pool);
        assert_eq!(driver.staged_input(), 4);
        driver.push_to_buffer(&pool);
        // Staged work already covers every slot; nothing further is claimed
        assert_eq!(driver.staged_input(), 4);
        assert_eq!(pool.primaries_to_go(), 6);
    }

    #[test]
    fn drivers_release_their_slabs_on_drop() {
        let scene = detector_scene();
        let physics = Ballistic;
        for cycle in 0..100 {
            let mut driver = Driver::new(64, &scene, &physics, 0.0, cycle);
            let (particles, tags) = beam(8, 10.0);
            driver.push(&particles, &tags);
            drop(driver);
            let mut batched = BatchedDriver::new(64, &scene, &physics, 0.0, cycle);
            batched.allocate_input_buffers(8);
            drop(batched);
        }
    }
}
