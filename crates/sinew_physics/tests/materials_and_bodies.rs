//! Integration tests for body construction and material handling.

use sinew_physics::{
    BodyKind, ErrorKind, Material, PhysicsConfig, PhysicsError, PhysicsSystem, RigidBody,
};
use sinew_shared::{Quaternion, Vec3};

fn configured() -> PhysicsSystem {
    let mut physics = PhysicsSystem::new(PhysicsConfig::default());
    physics.set_thread_count(1).unwrap();
    physics.configure().unwrap();
    physics
}

#[test]
fn test_mass_decides_mobility() {
    let at = Vec3::new(1.0, 2.0, 3.0);
    let q = Quaternion::IDENTITY;
    let cases = [
        RigidBody::create_box(Vec3::new(1.0, 2.0, 3.0), 0.0, at, q),
        RigidBody::create_sphere(1.0, 0.0, at, q),
        RigidBody::create_cone(1.0, 2.0, 0.0, at, q),
        RigidBody::create_cylinder(1.0, 2.0, 0.0, at, q),
        RigidBody::create_capsule(1.0, 2.0, 0.0, at, q),
    ];
    for body in cases {
        let body = body.unwrap();
        assert_eq!(body.kind(), BodyKind::Static);
        assert_eq!(body.local_inertia(), Vec3::ZERO);
        assert_eq!(body.position(), at);
    }

    let body = RigidBody::create_box(Vec3::new(1.0, 2.0, 3.0), 12.0, at, q).unwrap();
    assert_eq!(body.kind(), BodyKind::Dynamic);
    // m/12 * (ly² + lz², lx² + lz², lx² + ly²)
    let inertia = body.local_inertia();
    assert!((inertia.x - 13.0).abs() < 1e-4);
    assert!((inertia.y - 10.0).abs() < 1e-4);
    assert!((inertia.z - 5.0).abs() < 1e-4);
}

#[test]
fn test_bad_dimensions_name_the_dimension() {
    let q = Quaternion::IDENTITY;
    match RigidBody::create_cylinder(1.0, 0.0, 1.0, Vec3::ZERO, q) {
        Err(PhysicsError::InvalidGeometry {
            shape, dimension, ..
        }) => {
            assert_eq!(shape, "cylinder");
            assert_eq!(dimension, "height");
        }
        other => panic!("expected InvalidGeometry, got {other:?}"),
    }
    let err = RigidBody::create_box(Vec3::new(1.0, f32::NAN, 1.0), 1.0, Vec3::ZERO, q).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidGeometry);
}

#[test]
fn test_surface_values_clamp() {
    let mut body =
        RigidBody::create_sphere(0.5, 1.0, Vec3::ZERO, Quaternion::IDENTITY).unwrap();
    body.set_elasticity(1.5).set_friction(-0.2);
    assert_eq!(body.restitution(), 1.0);
    assert_eq!(body.friction(), 0.0);

    body.set_elasticity(0.4).set_friction(0.6);
    assert!((body.restitution() - 0.4).abs() < f32::EPSILON);
    assert!((body.friction() - 0.6).abs() < f32::EPSILON);
}

#[test]
fn test_materials_are_sequential_and_verbatim() {
    let mut physics = configured();
    let ice = physics
        .register_material(Material::new(0.1, 0.03, 0.05))
        .unwrap();
    let rubber = physics
        .register_material(Material::new(1.2, 1.1, 0.9))
        .unwrap();
    let plain = physics.register_material(Material::default()).unwrap();

    assert_eq!((ice.get(), rubber.get(), plain.get()), (1, 2, 3));
    assert_eq!(physics.get_material(2).unwrap(), Material::new(1.2, 1.1, 0.9));
    assert_eq!(physics.get_material(3).unwrap(), Material::DEFAULT);
}

#[test]
fn test_unknown_material_not_found() {
    let mut physics = configured();
    physics.register_material(Material::default()).unwrap();

    for id in [0, 2, u32::MAX] {
        let err = physics.get_material(id).unwrap_err();
        assert_eq!(err, PhysicsError::MaterialNotFound(id));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[test]
fn test_apply_material_clamps_onto_body() {
    let mut physics = configured();
    let rubber = physics
        .register_material(Material::new(1.2, 1.1, 0.9))
        .unwrap();
    let h = physics
        .add_body(RigidBody::create_sphere(0.5, 1.0, Vec3::ZERO, Quaternion::IDENTITY).unwrap())
        .unwrap();

    physics.apply_material(h, rubber.get()).unwrap();
    let body = physics.body(h).unwrap();
    assert_eq!(body.friction(), 1.0);
    assert!((body.restitution() - 0.9).abs() < f32::EPSILON);
    assert_eq!(body.material(), Some(rubber));

    assert_eq!(
        physics.apply_material(h, 9).unwrap_err(),
        PhysicsError::MaterialNotFound(9)
    );
}

#[test]
fn test_non_unit_rotation_passes_through() {
    let skewed = Quaternion::new(0.0, 0.0, 0.0, 2.0);
    let body = RigidBody::create_sphere(0.5, 0.0, Vec3::ZERO, skewed).unwrap();
    assert_eq!(body.rotation(), skewed);
}
