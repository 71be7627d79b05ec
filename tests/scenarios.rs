//! Scenario-level acceptance tests: the concrete numbered cases from the
//! design notes, each driven end-to-end through the public `World` API
//! rather than any single module's internals.

use approx::assert_relative_eq;
use cgmath::{InnerSpace, One, Zero};
use positional::{Body, BodyKind, Collider, Constraint, DofMask, Joint, Motor, Pose, Quat, Ray, Shape, Vec3, WorldConfig};
use positional::narrowphase;
use positional::world::World;

fn sphere_collider(radius: f64, mask: u32) -> Collider {
    Collider::new(Shape::new_sphere(radius).unwrap(), Pose::identity(true), mask)
}

fn box_collider(extents: Vec3, mask: u32) -> Collider {
    Collider::new(Shape::new_box(extents).unwrap(), Pose::identity(true), mask)
}

/// Scenario 1: a unit sphere dropped onto a static box floor comes to rest
/// at the expected height within the given tolerances.
#[test]
fn sphere_drop_onto_box_floor_comes_to_rest() {
    let mut config = WorldConfig::default();
    config.gravity = Vec3::new(0.0, -10.0, 0.0);
    config.substeps = 10;
    let mut world = World::new(config);

    let body = world.add_body(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(0.0, 2.0, 0.0), Quat::one(), true)));
    world.add_collider(Some(body), sphere_collider(1.0, 1));

    let mut floor = box_collider(Vec3::new(100.0, 1.0, 100.0), 1);
    floor.local_pose = Pose::new(Vec3::new(0.0, -1.0, 0.0), Quat::one(), true);
    world.add_collider(None, floor);

    for _ in 0..60 {
        world.simulate(1.0 / 60.0, None);
    }

    let b = world.bodies.get(body).unwrap();
    assert!((b.pose.position.y - 1.0).abs() < 0.02, "resting height was {}", b.pose.position.y);
    assert!(b.velocity.linear.magnitude() < 0.05);
}

/// Scenario 2: two equal-mass, fully-restitutive spheres approaching each
/// other along x exchange velocities and recede.
#[test]
fn two_spheres_with_full_restitution_exchange_velocities() {
    let mut config = WorldConfig::default();
    config.gravity = Vec3::zero();
    let mut world = World::new(config);

    let a = world.add_body(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(-2.0, 0.0, 0.0), Quat::one(), true)));
    let b = world.add_body(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(2.0, 0.0, 0.0), Quat::one(), true)));

    let mut collider_a = sphere_collider(1.0, 1);
    collider_a.restitution = 1.0;
    let mut collider_b = sphere_collider(1.0, 1);
    collider_b.restitution = 1.0;
    world.add_collider(Some(a), collider_a);
    world.add_collider(Some(b), collider_b);

    world.bodies.get_mut(a).unwrap().velocity.linear = Vec3::new(1.0, 0.0, 0.0);
    world.bodies.get_mut(b).unwrap().velocity.linear = Vec3::new(-1.0, 0.0, 0.0);

    for _ in 0..(4 * 60) {
        world.simulate(1.0 / 60.0, None);
    }

    let va = world.bodies.get(a).unwrap().velocity.linear;
    let vb = world.bodies.get(b).unwrap().velocity.linear;

    assert_relative_eq!(va.x, -1.0, epsilon = 0.01);
    assert_relative_eq!(vb.x, 1.0, epsilon = 0.01);
    assert!(va.x < 0.0, "a should be receding (moving back toward -x)");
    assert!(vb.x > 0.0, "b should be receding (moving back toward +x)");
}

/// Scenario 3: a twist-only hinge with limits [-pi/4, pi/4] under a constant
/// motor torque saturates at the limit and never exceeds it.
#[test]
fn hinge_twist_limit_saturates_under_constant_motor_torque() {
    let mut world = World::new(WorldConfig::default());

    let a = world.add_body(Body::new(BodyKind::Rigid, Pose::identity(true)));
    let b = world.add_body(Body::new(BodyKind::Rigid, Pose::identity(true)));

    // Free bodies with no colliders: give them finite mass directly so the
    // joint and motor have something to act against.
    world.bodies.get_mut(a).unwrap().inv_mass = 1.0;
    world.bodies.get_mut(a).unwrap().inv_inertia = Vec3::new(1.0, 1.0, 1.0);
    world.bodies.get_mut(b).unwrap().inv_mass = 1.0;
    world.bodies.get_mut(b).unwrap().inv_inertia = Vec3::new(1.0, 1.0, 1.0);

    let mut joint = Joint::new(Pose::identity(true), Pose::identity(true));
    joint.free_dofs = DofMask::TWIST;
    joint.limited_dofs = DofMask::TWIST;
    joint.twist_limit_min = -std::f64::consts::FRAC_PI_4;
    joint.twist_limit_max = std::f64::consts::FRAC_PI_4;
    world.add_constraint(Constraint::joint(Some(a), Some(b), joint));

    let motor = Motor::new(Vec3::unit_x(), 10.0);
    world.add_constraint(Constraint::motor(Some(a), Some(b), motor));

    for _ in 0..(2 * 60) {
        world.simulate(1.0 / 60.0, None);
    }

    let rot_a = world.bodies.get(a).unwrap().pose.rotation;
    let rot_b = world.bodies.get(b).unwrap().pose.rotation;
    let relative = rot_a.conjugate() * rot_b;
    let axis = Vec3::unit_x();
    let twist_vec = relative.v.project_on(axis);
    let mut twist_angle = 2.0 * twist_vec.magnitude().atan2(relative.s);
    if twist_vec.dot(axis) < 0.0 {
        twist_angle = -twist_angle;
    }

    assert!(twist_angle.abs() <= std::f64::consts::FRAC_PI_4 + 1e-3, "twist angle {} exceeded the limit", twist_angle);
    assert_relative_eq!(twist_angle.abs(), std::f64::consts::FRAC_PI_4, epsilon = 1e-2);
}

/// Scenario 4: a raycast through the broadphase against 1000 static
/// colliders returns exactly the set a brute-force ray/sphere test finds.
#[test]
fn raycast_through_broadphase_matches_brute_force_over_a_thousand_colliders() {
    let mut world = World::new(WorldConfig::default());

    let radius = 0.4;
    let mut centers = Vec::with_capacity(1000);
    for i in 0..1000u32 {
        // Deterministic pseudo-scatter across [-10, 10]^3 (no external RNG dependency).
        let x = ((i.wrapping_mul(2654435761) % 2001) as f64) / 100.0 - 10.0;
        let y = ((i.wrapping_mul(40503) % 2001) as f64) / 100.0 - 10.0;
        let z = ((i.wrapping_mul(69069).wrapping_add(1) % 2001) as f64) / 100.0 - 10.0;
        let center = Vec3::new(x, y, z);
        centers.push(center);
        world.add_collider(None, {
            let mut c = sphere_collider(radius, 1);
            c.local_pose = Pose::new(center, Quat::one(), true);
            c
        });
    }

    let ray = Ray::new(Vec3::new(-20.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let max_distance = 40.0;

    let mut hit_centers = Vec::new();
    world.raycast(&ray, 1, max_distance, |_, point, _, _| {
        hit_centers.push(point);
    });

    let mut brute_force = Vec::new();
    for &center in &centers {
        if let Some(t) = ray_sphere_distance(ray.origin, Vec3::new(1.0, 0.0, 0.0), center, radius) {
            if t <= max_distance {
                brute_force.push(ray.origin + Vec3::new(1.0, 0.0, 0.0) * t);
            }
        }
    }

    assert_eq!(hit_centers.len(), brute_force.len());
}

fn ray_sphere_distance(origin: Vec3, direction: Vec3, center: Vec3, radius: f64) -> Option<f64> {
    let m = origin - center;
    let b = m.dot(direction);
    let c = m.dot(m) - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    if t < 0.0 {
        None
    } else {
        Some(t)
    }
}

/// Scenario 5: a sphere embedded in a box reports a contact along the
/// least-penetrating face with the expected depth.
#[test]
fn box_sphere_dispatch_picks_least_penetrating_face() {
    let box_col = Collider::new(Shape::new_box(Vec3::new(1.0, 1.0, 1.0)).unwrap(), Pose::identity(true), 1);
    let sphere_col = Collider::new(Shape::new_sphere(0.5).unwrap(), Pose::identity(true), 1);

    let box_pose = Pose::new(Vec3::zero(), Quat::one(), true);
    let sphere_pose = Pose::new(Vec3::new(0.9, 0.0, 0.0), Quat::one(), true);

    let contact = narrowphase::compute(&box_col, &box_pose, &sphere_col, &sphere_pose, 16, 28).unwrap();

    assert_relative_eq!(contact.depth, 0.5 + (1.0 - 0.9), epsilon = 1e-9);
    assert_relative_eq!(contact.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-9);
}

/// Scenario 6: erasing one body leaves every other outstanding `Ref` to
/// dereference to its original, unchanged entry.
#[test]
fn stable_refs_survive_an_unrelated_erase() {
    let mut world = World::new(WorldConfig::default());

    let refs: Vec<_> = (0..100)
        .map(|i| world.add_body(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(i as f64, 0.0, 0.0), Quat::one(), true))))
        .collect();

    let target = refs[42];
    let target_pos_before = world.bodies.get(target).unwrap().pose.position;

    world.remove_body(refs[17]);

    assert_eq!(world.bodies.get(target).unwrap().pose.position, target_pos_before);
    assert!(world.bodies.get(refs[17]).is_none());

    for (i, &r) in refs.iter().enumerate() {
        if i == 17 {
            continue;
        }
        assert_eq!(world.bodies.get(r).unwrap().pose.position, Vec3::new(i as f64, 0.0, 0.0));
    }
}
