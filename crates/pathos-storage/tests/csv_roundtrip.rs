use pathos_core::{CombatStats, FloatRange, Heuristic, HeuristicSampler, RangeSpec};
use pathos_storage::{HeuristicsError, is_heuristics_file, load_heuristics, write_heuristics};
use rand::{SeedableRng, rngs::SmallRng};
use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_path(prefix: &str, extension: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "{prefix}-{}-{}.{extension}",
        std::process::id(),
        timestamp
    ))
}

#[test]
fn exported_records_reload_identically() {
    let combat = CombatStats {
        accuracy: 80.0,
        evasion: 10.0,
    };
    let mut spec = RangeSpec::default();
    spec.accuracy = FloatRange::constant(combat.accuracy);
    spec.evasion = FloatRange::constant(combat.evasion);

    let mut rng = SmallRng::seed_from_u64(0x5EED);
    let mut sampler = HeuristicSampler::range(spec);
    let records: Vec<_> = (0..16).map(|_| sampler.sample(&mut rng)).collect();

    let path = temp_path("pathos_roundtrip", "csv");
    write_heuristics(&path, &records, &Heuristic::ALL).expect("write");
    assert!(is_heuristics_file(&path));

    let loaded = load_heuristics(&path, &Heuristic::ALL, combat).expect("reload");
    assert!(loaded.skipped_lines.is_empty());
    assert_eq!(loaded.records.len(), records.len());
    for (original, reloaded) in records.iter().zip(&loaded.records) {
        assert!((original.experience_scale - reloaded.experience_scale).abs() < 1e-6);
        assert_eq!(original.accuracy, reloaded.accuracy);
        assert_eq!(original.evasion, reloaded.evasion);
        for (a, b) in original.traits.iter().zip(&reloaded.traits) {
            assert_eq!(a.heuristic, b.heuristic);
            assert!((a.scale - b.scale).abs() < 1e-6);
        }
    }

    let _ = fs::remove_file(&path);
}

#[test]
fn missing_file_reports_io_error() {
    let path = temp_path("pathos_missing", "csv");
    let err = load_heuristics(&path, &Heuristic::ALL, CombatStats::default()).unwrap_err();
    assert!(matches!(err, HeuristicsError::Io { .. }));
    assert!(!is_heuristics_file(&path));
}

#[test]
fn non_csv_extension_is_not_a_heuristics_file() {
    let path = temp_path("pathos_not_csv", "txt");
    fs::write(&path, "experience\n0.5,0,0,0,0,0,0,0\n").expect("write");
    assert!(!is_heuristics_file(&path));
    // The loader itself does not care about the extension.
    let loaded = load_heuristics(&path, &Heuristic::ALL, CombatStats::default()).expect("load");
    assert_eq!(loaded.records.len(), 1);
    let _ = fs::remove_file(&path);
}
