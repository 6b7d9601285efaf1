#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use std::path::PathBuf;

use evo_tank::simulation::cell::CellKind;
use evo_tank::simulation::error::{ConfigError, TankError};
use evo_tank::simulation::params::Params;
use evo_tank::simulation::snapshot::TankSnapshot;
use evo_tank::simulation::tank::Tank;

fn create_test_params() -> Params {
    Params {
        seed: 11,
        initial_plants: 80,
        initial_protozoa: 10,
        hidden_layers: vec![4],
        ..Params::default()
    }
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("evo_tank_{}_{}.json", name, std::process::id()))
}

#[test]
fn test_fresh_tank_publishes_empty_snapshot() {
    let tank = Tank::new(create_test_params()).unwrap();
    let snapshot = tank.reader().latest();

    assert_eq!(snapshot.tick, 0);
    assert!(snapshot.cells.is_empty());
    assert_eq!(snapshot.stats["Plants"], 0.0);
}

#[test]
fn test_snapshot_counts_match_population() {
    let mut tank = Tank::new(create_test_params()).unwrap();
    tank.seed_population().unwrap();

    let snapshot = tank.reader().latest();
    for kind in CellKind::ALL {
        assert_eq!(snapshot.count(kind), tank.population(kind));
    }
    assert_eq!(snapshot.stats, tank.stats());
}

#[test]
fn test_save_and_load_snapshot() {
    let mut tank = Tank::new(create_test_params()).unwrap();
    tank.seed_population().unwrap();
    for _ in 0..10 {
        tank.tick(0.005);
    }
    let snapshot = tank.snapshot();
    let path = temp_path("roundtrip");

    snapshot.save_to_file(&path).unwrap();
    let loaded = TankSnapshot::load_from_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.tick, 10);
    assert_eq!(loaded.cells.len(), snapshot.cells.len());
    for (a, b) in loaded.cells.iter().zip(&snapshot.cells) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.generation, b.generation);
        assert!(a.position.distance(b.position) < 1e-6);
        assert!((a.radius - b.radius).abs() < 1e-7);
    }
}

#[test]
fn test_load_missing_snapshot_fails() {
    let result = TankSnapshot::load_from_file(temp_path("does_not_exist"));
    assert!(matches!(result, Err(TankError::Io(_))));
}

#[test]
fn test_load_malformed_snapshot_fails() {
    let path = temp_path("malformed");
    std::fs::write(&path, "{ not json").unwrap();

    let result = TankSnapshot::load_from_file(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(TankError::Json(_))));
}

#[test]
fn test_params_file_fills_defaults() {
    let path = temp_path("params");
    std::fs::write(&path, r#"{ "seed": 99, "tank_radius": 3.0 }"#).unwrap();

    let params = Params::from_json_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(params.seed, 99);
    assert_eq!(params.tank_radius, 3.0);
    assert_eq!(params.chunk_divisions, Params::default().chunk_divisions);
    assert!((params.chunk_size() - 0.3).abs() < 1e-6);
}

#[test]
fn test_params_file_is_validated() {
    let path = temp_path("bad_params");
    std::fs::write(&path, r#"{ "max_cell_radius": 5.0 }"#).unwrap();

    let result = Params::from_json_file(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(
        result,
        Err(ConfigError::Invalid {
            name: "max_cell_radius",
            ..
        })
    ));
}

#[test]
fn test_invalid_params_rejected() {
    let cases = [
        Params {
            tank_radius: -1.0,
            ..Params::default()
        },
        Params {
            fluid_drag: 1.0,
            ..Params::default()
        },
        Params {
            min_protozoan_split_radius: 0.05,
            max_protozoan_split_radius: 0.01,
            ..Params::default()
        },
        Params {
            hidden_layers: vec![8, 0],
            ..Params::default()
        },
        Params {
            death_health: 0.9,
            ..Params::default()
        },
    ];
    for params in cases {
        assert!(params.validate().is_err(), "{params:?} should be rejected");
    }
    assert!(Params::default().validate().is_ok());
}
