#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use std::borrow::Cow;

use evo_tank::simulation::brain::ConstantBrain;
use evo_tank::simulation::cell::protozoan::{sensor_count, vision_rays};
use evo_tank::simulation::cell::{Behavior, Body, Cell, CellKind, Meat, Plan, Plant, Protozoan, Spawner};
use evo_tank::simulation::chunks::ChunkManager;
use evo_tank::simulation::events::{EventQueue, SimulationEvent, apply_events};
use evo_tank::simulation::geometric_utils::{confine_to_arena, line_circle_distance, sphere_volume};
use evo_tank::simulation::locatable::CellId;
use evo_tank::simulation::params::Params;
use evo_tank::simulation::vector::Vector2;

fn create_test_params() -> Params {
    Params {
        seed: 3,
        ..Params::default()
    }
}

fn plant_cell(id: u64, pos: Vector2, radius: f32, plant: Plant) -> Cell {
    Cell::new(CellId(id), Body::at(pos, radius), Behavior::Plant(plant))
}

fn meat_cell(id: u64, pos: Vector2, radius: f32, params: &Params) -> Cell {
    Cell::new(CellId(id), Body::at(pos, radius), Behavior::Meat(Meat::new(params)))
}

fn idle_protozoan(id: u64, pos: Vector2, radius: f32, split_radius: f32, params: &Params, spawner: &mut Spawner) -> Cell {
    let mut protozoan = Protozoan::with_brain(Box::new(ConstantBrain::idle()), params, spawner.rng());
    protozoan.split_radius = split_radius;
    protozoan.heading = Vector2::new(1.0, 0.0);
    Cell::new(CellId(id), Body::at(pos, radius), Behavior::Protozoan(protozoan))
}

fn volume_of(cells: &[Cell]) -> f32 {
    cells.iter().map(|c| sphere_volume(c.body.radius)).sum()
}

#[test]
fn test_uncrowded_growth_rate() {
    let params = create_test_params();
    let plant = Plant::with_traits(0.05, 1.0);

    let rate = plant.growth_rate(0.02, 1.0, &params);
    assert!((rate - 0.05 * 6.0f32.tanh()).abs() < 1e-7);

    // Only positive growth is scaled by health
    let weak = plant.growth_rate(0.02, 0.5, &params);
    assert!((weak - 0.5 * rate).abs() < 1e-7);
}

#[test]
fn test_overcrowded_plant_shrinks() {
    let params = create_test_params();
    let mut plant = Plant::with_traits(0.05, 1.0);
    plant.crowding = params.plant_critical_crowding + 2.0;

    let rate = plant.growth_rate(0.02, 1.0, &params);
    let x = (-2.0f32).tanh();
    let expected = 0.05 * (1.0 - (-x).exp());
    assert!(rate < 0.0);
    assert!((rate - expected).abs() < 1e-6);
    // Negative growth ignores health
    assert_eq!(plant.growth_rate(0.02, 0.3, &params), rate);
}

#[test]
fn test_growth_damped_past_split_radius() {
    let params = create_test_params();
    let plant = Plant::with_traits(0.05, 0.02);

    let below = plant.growth_rate(0.02, 1.0, &params);
    let above = plant.growth_rate(0.07, 1.0, &params);
    assert!((above - below * (-0.05f32).exp()).abs() < 1e-6);
}

#[test]
fn test_crowding_contribution() {
    let own = Body::at(Vector2::ZERO, 0.02);
    let near = Body::at(Vector2::new(0.03, 0.0), 0.01);
    let far = Body::at(Vector2::new(0.07, 0.0), 0.01);

    let c = Plant::crowding_contribution(&own, &near);
    assert!((c - 0.01 / (0.02 + 0.0009)).abs() < 1e-6);
    assert_eq!(Plant::crowding_contribution(&own, &far), 0.0);
}

#[test]
fn test_set_health_caps_and_kills() {
    let params = create_test_params();
    let mut cell = meat_cell(1, Vector2::ZERO, 0.02, &params);

    cell.set_health(1.7, &params);
    assert_eq!(cell.body.health, 1.0);
    assert!(cell.is_alive());

    cell.set_health(params.death_health * 0.5, &params);
    assert!(!cell.is_alive());
}

#[test]
fn test_remove_mass_shrinks_then_kills() {
    let params = create_test_params();
    let mut cell = meat_cell(1, Vector2::ZERO, 0.02, &params);
    let mass = cell.mass(&params);

    cell.remove_mass(mass * 0.5, &params);
    assert!(cell.is_alive());
    assert!((cell.mass(&params) - 0.5 * mass).abs() < 1e-3 * mass);

    cell.remove_mass(mass, &params);
    assert!(!cell.is_alive());
    assert!(cell.body.radius >= params.min_cell_radius);
}

#[test]
fn test_killed_protozoan_leaves_meat() {
    let params = create_test_params();
    let mut spawner = Spawner::new(9);
    let mut cell = idle_protozoan(1000, Vector2::new(0.3, 0.2), 0.03, 0.025, &params, &mut spawner);
    cell.generation = 4;

    assert!(cell.remains(&params, &mut spawner).is_empty());
    cell.kill();
    assert!(cell.leaves_remains());

    let remains = cell.remains(&params, &mut spawner);
    assert_eq!(remains.len(), params.protozoan_remains_count);
    for pellet in &remains {
        assert_eq!(pellet.kind(), CellKind::Meat);
        assert_eq!(pellet.generation, 5);
        assert!(pellet.is_alive());
        assert!(pellet.body.radius >= params.min_cell_radius);
    }
    assert!(volume_of(&remains) <= sphere_volume(0.03));
}

#[test]
fn test_discarded_cells_leave_nothing() {
    let params = create_test_params();
    let mut spawner = Spawner::new(9);
    let mut protozoan = idle_protozoan(1, Vector2::ZERO, 0.03, 0.025, &params, &mut spawner);
    protozoan.discard();
    assert!(!protozoan.leaves_remains());
    assert!(protozoan.remains(&params, &mut spawner).is_empty());

    let mut plant = plant_cell(2, Vector2::ZERO, 0.02, Plant::with_traits(0.05, 0.03));
    plant.kill();
    assert!(!plant.leaves_remains());
}

#[test]
fn test_tiny_parent_miscarries_offspring() {
    let params = create_test_params();
    let mut spawner = Spawner::new(1);
    let mut cell = idle_protozoan(1, Vector2::ZERO, 0.012, 0.02, &params, &mut spawner);
    cell.kill();

    // Every pellet would fall below the minimum radius
    let params = Params {
        min_cell_radius: 0.011,
        ..params
    };
    assert!(cell.remains(&params, &mut spawner).is_empty());
}

#[test]
fn test_protozoan_split() {
    let params = create_test_params();
    let mut spawner = Spawner::new(5);
    let mut cell = idle_protozoan(1000, Vector2::ZERO, 0.03, 0.02, &params, &mut spawner);

    let children = cell.apply(Plan::default(), &params, 0.005, &mut spawner).unwrap();

    assert!(!cell.is_alive());
    assert!(!cell.leaves_remains());
    assert_eq!(children.len(), params.protozoan_split_count);
    for child in &children {
        assert_eq!(child.kind(), CellKind::Protozoan);
        assert_eq!(child.generation, 2);
        assert!(child.body.radius < cell.body.radius);
        assert_ne!(child.id, cell.id);
    }
    assert!(volume_of(&children) <= sphere_volume(cell.body.radius));
}

#[test]
fn test_unhealthy_protozoan_does_not_split() {
    let params = create_test_params();
    let mut spawner = Spawner::new(5);
    let mut cell = idle_protozoan(1, Vector2::ZERO, 0.03, 0.02, &params, &mut spawner);
    cell.body.health = 0.5;

    let children = cell.apply(Plan::default(), &params, 0.005, &mut spawner).unwrap();
    assert!(children.is_empty());
    assert!(cell.is_alive());
    assert!(cell.body.health < 0.5);
}

#[test]
fn test_plant_burst_bindings_are_symmetric() {
    let params = create_test_params();
    let mut spawner = Spawner::new(17);
    let mut cell = plant_cell(1000, Vector2::ZERO, 0.06, Plant::with_traits(0.05, 0.05));

    let children = cell.apply(Plan::default(), &params, 0.005, &mut spawner).unwrap();

    assert!(!cell.is_alive());
    assert_eq!(children.len(), params.plant_burst_count);
    // The last child is always placed at the binding rest length from its predecessor
    let ends: usize = children.iter().map(|c| c.as_plant().unwrap().bindings().len()).sum();
    assert!(ends >= 2);
    assert_eq!(ends % 2, 0);
    for child in &children {
        let plant = child.as_plant().unwrap();
        for &partner in plant.bindings() {
            let other = children.iter().find(|c| c.id == partner).unwrap();
            assert!(other.as_plant().unwrap().is_attached(child.id));
        }
    }
    assert!(volume_of(&children) <= sphere_volume(cell.body.radius));
}

#[test]
fn test_plant_cohesion_pulls_unbound_neighbours() {
    let params = create_test_params();
    let mut chunks = ChunkManager::new(&params);
    chunks.add(plant_cell(1, Vector2::ZERO, 0.01, Plant::with_traits(0.05, 1.0)));
    chunks.add(plant_cell(2, Vector2::new(0.03, 0.0), 0.01, Plant::with_traits(0.05, 1.0)));

    let left = chunks.get(CellId(1)).unwrap().plan(&chunks, &params, 0.005).unwrap();
    let right = chunks.get(CellId(2)).unwrap().plan(&chunks, &params, 0.005).unwrap();

    assert!(left.accel.x > 0.0);
    assert!(right.accel.x < 0.0);
    assert!(left.accel.y.abs() < 1e-9);
    assert!((left.accel.x + right.accel.x).abs() < 1e-6);
    // Not touching, so nothing pushes them apart
    assert_eq!(left.push, Vector2::ZERO);
    assert!(left.detach.is_empty());
}

#[test]
fn test_bound_plants_feel_no_cohesion() {
    let params = create_test_params();
    let mut a = Plant::with_traits(0.05, 1.0);
    let mut b = Plant::with_traits(0.05, 1.0);
    a.bind(CellId(2));
    b.bind(CellId(1));
    let mut chunks = ChunkManager::new(&params);
    chunks.add(plant_cell(1, Vector2::ZERO, 0.01, a));
    chunks.add(plant_cell(2, Vector2::new(0.025, 0.0), 0.01, b));

    let left = chunks.get(CellId(1)).unwrap().plan(&chunks, &params, 0.005).unwrap();
    let right = chunks.get(CellId(2)).unwrap().plan(&chunks, &params, 0.005).unwrap();

    assert_eq!(left.accel, Vector2::ZERO);
    assert_eq!(right.accel, Vector2::ZERO);
    // Stretched past the rest length, the binding pulls them together
    assert!(left.push.x > 0.0);
    assert!(right.push.x < 0.0);
    assert!(left.detach.is_empty() && right.detach.is_empty());
}

#[test]
fn test_binding_detaches_when_partner_dies_or_drifts() {
    let params = create_test_params();
    let mut spawner = Spawner::new(4);
    let mut chunks = ChunkManager::new(&params);
    chunks.add(plant_cell(2, Vector2::new(0.04, 0.0), 0.01, Plant::with_traits(0.05, 1.0)));
    let mut dead = plant_cell(3, Vector2::new(0.0, 0.022), 0.01, Plant::with_traits(0.05, 1.0));
    dead.kill();
    chunks.add(dead);
    chunks.add(plant_cell(4, Vector2::new(-0.022, 0.0), 0.01, Plant::with_traits(0.05, 1.0)));

    let mut plant = Plant::with_traits(0.05, 1.0);
    for partner in [2, 3, 4, 99] {
        plant.bind(CellId(partner));
    }
    let mut cell = plant_cell(1, Vector2::ZERO, 0.01, plant);

    let plan = cell.plan(&chunks, &params, 0.005).unwrap();
    let mut detached = plan.detach.clone();
    detached.sort_unstable();
    assert_eq!(detached, vec![CellId(2), CellId(3), CellId(99)]);

    let children = cell.apply(plan, &params, 0.005, &mut spawner).unwrap();
    assert!(children.is_empty());
    assert_eq!(cell.as_plant().unwrap().bindings(), &[CellId(4)]);
}

#[test]
fn test_meat_expires_without_remains() {
    let params = Params {
        meat_lifetime: 0.01,
        ..create_test_params()
    };
    let mut spawner = Spawner::new(2);
    let mut cell = meat_cell(1, Vector2::ZERO, 0.02, &params);

    cell.apply(Plan::default(), &params, 0.005, &mut spawner).unwrap();
    assert!(cell.is_alive());
    assert!(cell.body.health < 1.0);

    cell.apply(Plan::default(), &params, 0.01, &mut spawner).unwrap();
    assert!(!cell.is_alive());
    assert!(!cell.leaves_remains());
}

#[test]
fn test_collision_push_is_mass_weighted() {
    let params = create_test_params();
    let mut chunks = ChunkManager::new(&params);
    chunks.add(meat_cell(1, Vector2::new(-0.005, 0.0), 0.01, &params));
    chunks.add(meat_cell(2, Vector2::new(0.005, 0.0), 0.01, &params));
    chunks.add(meat_cell(3, Vector2::new(1.0, 1.0), 0.02, &params));
    chunks.add(meat_cell(4, Vector2::new(1.0, 1.05), 0.02, &params));

    let push = |id: u64| {
        let cell = chunks.get(CellId(id)).unwrap();
        cell.plan(&chunks, &params, 0.005).unwrap().push
    };

    let (a, b) = (push(1), push(2));
    assert!((a.x + 0.005).abs() < 1e-6 && a.y.abs() < 1e-6);
    assert!((b.x - 0.005).abs() < 1e-6 && b.y.abs() < 1e-6);

    // Separated cells do not push
    assert_eq!(push(3), Vector2::ZERO);
}

#[test]
fn test_coincident_cells_separate_along_fixed_axis() {
    let params = create_test_params();
    let mut chunks = ChunkManager::new(&params);
    chunks.add(meat_cell(1, Vector2::new(0.2, 0.2), 0.01, &params));
    chunks.add(meat_cell(2, Vector2::new(0.2, 0.2), 0.01, &params));

    let a = chunks.get(CellId(1)).unwrap().plan(&chunks, &params, 0.005).unwrap().push;
    let b = chunks.get(CellId(2)).unwrap().plan(&chunks, &params, 0.005).unwrap().push;
    assert!(a.x < 0.0);
    assert!(b.x > 0.0);
    assert_eq!(a, -b);
}

#[test]
fn test_protozoan_plans_bite_on_contact() {
    let params = create_test_params();
    let mut spawner = Spawner::new(4);
    let mut chunks = ChunkManager::new(&params);
    chunks.add(idle_protozoan(1, Vector2::ZERO, 0.012, 0.02, &params, &mut spawner));
    chunks.add(plant_cell(2, Vector2::new(0.025, 0.0), 0.02, Plant::with_traits(0.05, 0.03)));
    chunks.add(plant_cell(3, Vector2::new(0.1, 0.0), 0.02, Plant::with_traits(0.05, 0.03)));

    let cell = chunks.get(CellId(1)).unwrap();
    let plan = cell.plan(&chunks, &params, 0.005).unwrap();

    assert_eq!(plan.events.len(), 1);
    assert!(plan.motor.is_some());
}

#[test]
fn test_bite_transfers_mass() {
    let params = create_test_params();
    let mut spawner = Spawner::new(4);
    let mut chunks = ChunkManager::new(&params);
    chunks.add(idle_protozoan(1, Vector2::ZERO, 0.012, 0.02, &params, &mut spawner));
    chunks.add(plant_cell(2, Vector2::new(0.025, 0.0), 0.02, Plant::with_traits(0.05, 0.03)));
    let plant_mass = chunks.get(CellId(2)).unwrap().mass(&params);

    let mut queue = EventQueue::new();
    assert!(queue.is_empty());
    queue.push(SimulationEvent::Bite {
        eater: CellId(1),
        target: CellId(2),
        extraction: 0.01,
    });
    // Unknown targets are ignored
    queue.push(SimulationEvent::Bite {
        eater: CellId(1),
        target: CellId(99),
        extraction: 0.01,
    });
    assert_eq!(queue.len(), 2);
    apply_events(&mut chunks, &params, queue);

    let plant = chunks.get(CellId(2)).unwrap();
    assert!((plant.mass(&params) - 0.99 * plant_mass).abs() < 1e-3 * plant_mass);
    assert!((plant.body.health - 0.95).abs() < 1e-6);

    let stored = chunks.get(CellId(1)).unwrap().as_protozoan().unwrap().construction_mass;
    let expected = (params.eating_conversion_ratio * 0.01 * plant_mass)
        .min(Protozoan::construction_mass_cap(0.012, &params));
    assert!((stored - expected).abs() < 1e-9);
}

#[test]
fn test_brain_with_too_few_outputs_fails_plan() {
    let params = create_test_params();
    let mut spawner = Spawner::new(4);
    let protozoan = Protozoan::with_brain(Box::new(ConstantBrain::new(vec![1.0])), &params, spawner.rng());
    let mut chunks = ChunkManager::new(&params);
    chunks.add(Cell::new(CellId(1), Body::at(Vector2::ZERO, 0.012), Behavior::Protozoan(protozoan)));

    let cell = chunks.get(CellId(1)).unwrap();
    assert!(cell.plan(&chunks, &params, 0.005).is_err());
}

#[test]
fn test_sensors_see_plant_ahead() {
    let params = Params {
        vision_rays: 1,
        ..create_test_params()
    };
    let mut spawner = Spawner::new(8);
    let cell = idle_protozoan(1, Vector2::ZERO, 0.012, 0.024, &params, &mut spawner);
    let plant = plant_cell(2, Vector2::new(0.05, 0.0), 0.01, Plant::with_traits(0.05, 0.03));

    let inputs = cell.as_protozoan().unwrap().sense(&cell, &[&plant], &params);

    assert_eq!(inputs.len(), sensor_count(&params));
    assert_eq!(inputs[0], 1.0);
    assert_eq!(inputs[1], 0.0);
    assert_eq!(inputs[2], 0.0);
    assert!((inputs[3] - (1.0 - 0.04 / params.protozoa_interact_range)).abs() < 1e-5);
    assert_eq!(inputs[4], 1.0);
    assert!((inputs[5] - 0.5).abs() < 1e-6);

    let nothing = cell.as_protozoan().unwrap().sense(&cell, &[], &params);
    assert!(nothing[..4].iter().all(|v| *v == 0.0));
}

#[test]
fn test_vision_rays_span_field_of_view() {
    let single = vision_rays(0.0, 1.0, 1, 2.0);
    assert_eq!(single.len(), 1);
    assert!((single[0].x - 2.0).abs() < 1e-6 && single[0].y.abs() < 1e-6);

    let fov = std::f32::consts::FRAC_PI_2;
    let rays = vision_rays(0.0, fov, 3, 1.0);
    assert_eq!(rays.len(), 3);
    assert!((rays[0].to_angle() + fov / 2.0).abs() < 1e-5);
    assert!(rays[1].to_angle().abs() < 1e-5);
    assert!((rays[2].to_angle() - fov / 2.0).abs() < 1e-5);
    assert!(rays.iter().all(|r| (r.length() - 1.0).abs() < 1e-5));
}

#[test]
fn test_line_circle_distance() {
    let d = line_circle_distance(Vector2::ZERO, Vector2::new(1.0, 0.0), Vector2::new(0.5, 0.3));
    assert!((d - 0.3).abs() < 1e-6);

    // Beyond the segment end the distance is to the endpoint
    let d = line_circle_distance(Vector2::ZERO, Vector2::new(1.0, 0.0), Vector2::new(1.3, 0.4));
    assert!((d - 0.5).abs() < 1e-6);
}

#[test]
fn test_confine_to_arena() {
    let mut inside = Vector2::new(0.5, 0.0);
    assert!(!confine_to_arena(&mut inside, 0.1, 2.0));
    assert_eq!(inside, Vector2::new(0.5, 0.0));

    let mut outside = Vector2::new(0.0, 3.0);
    assert!(confine_to_arena(&mut outside, 0.1, 2.0));
    assert!(outside.x.abs() < 1e-6);
    assert!((outside.y - 0.98 * 1.9).abs() < 1e-5);
}

#[test]
fn test_cell_stats_cover_variant() {
    let params = create_test_params();
    let mut spawner = Spawner::new(6);
    let protozoan = idle_protozoan(1, Vector2::ZERO, 0.012, 0.024, &params, &mut spawner);
    let plant = plant_cell(2, Vector2::ZERO, 0.02, Plant::with_traits(0.05, 0.03));

    let stats = protozoan.stats(&params);
    assert_eq!(stats["Generation"], 1.0);
    assert!((stats["Relative Size"] - 0.5).abs() < 1e-6);
    assert!(stats.contains_key("Herbivore Factor"));
    assert!(!stats.contains_key("Crowding Factor"));

    let stats = plant.stats(&params);
    assert!((stats["Size"] - 2.0).abs() < 1e-5);
    assert!(stats.contains_key("Crowding Factor"));
    assert!(!stats.contains_key("Num Cell Bindings"));
}

#[test]
fn test_cell_stats_use_static_labels() {
    let params = create_test_params();
    let mut spawner = Spawner::new(8);
    let cells = [
        idle_protozoan(1, Vector2::ZERO, 0.012, 0.024, &params, &mut spawner),
        plant_cell(2, Vector2::ZERO, 0.02, Plant::with_traits(0.05, 0.03)),
        meat_cell(3, Vector2::ZERO, 0.02, &params),
    ];
    for cell in &cells {
        let stats = cell.stats(&params);
        assert!(stats.contains_key("Age"));
        assert!(stats.keys().all(|key| matches!(key, Cow::Borrowed(_))));
    }
}
