use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

use fieldstage_core::{
    hash_file, run_ingest, verify_manifest, IngestOptions, PlaceMode, INVENTORY_FILE_NAME,
    MANIFEST_FILE_NAME, RUN_LOG_FILE_NAME,
};

fn example_import(temp: &TempDir) -> PathBuf {
    let input = temp.path().join("FieldImport_01_20250905");
    fs::create_dir_all(input.join("camera_01")).expect("mkdir camera");
    fs::create_dir_all(input.join("ARU_02")).expect("mkdir aru");
    fs::write(input.join("camera_01/photo.jpg"), b"0123456789").expect("write photo");
    fs::write(input.join("ARU_02/clip.wav"), b"01234567890123456789").expect("write clip");
    input
}

fn example_options(input: PathBuf, staging_base: PathBuf, mode: PlaceMode) -> IngestOptions {
    IngestOptions {
        input,
        reserve: "R034".to_string(),
        site: "S005".to_string(),
        deployment: "20250905".to_string(),
        staging_base,
        mode,
        ..IngestOptions::default()
    }
}

#[test]
fn copy_mode_with_hashing_matches_worked_example() -> Result<()> {
    let temp = TempDir::new()?;
    let input = example_import(&temp);
    let options = IngestOptions {
        compute_hash: true,
        ..example_options(input, temp.path().join("staging"), PlaceMode::Copy)
    };

    let report = run_ingest(&options)?;
    let staging_root = PathBuf::from(&report.staging_root);

    assert!(staging_root.ends_with("projects/field-data/raw/2025/R034/S005/Deployment_20250905"));
    assert_eq!(report.counters.files, 2);
    assert_eq!(report.counters.staged_files, 2);
    assert_eq!(report.counters.problems, 0);
    assert_eq!(report.devices.len(), 2);
    assert_eq!(report.devices[0].label, "ARU02");
    assert_eq!(report.devices[1].label, "CAM01");

    // Copied bytes match the sources.
    assert_eq!(
        fs::read(staging_root.join("CAM01/photo.jpg"))?,
        b"0123456789"
    );
    assert_eq!(
        fs::read(staging_root.join("ARU02/clip.wav"))?,
        b"01234567890123456789"
    );

    let inventory = fs::read_to_string(staging_root.join(INVENTORY_FILE_NAME))?;
    let lines: Vec<&str> = inventory.lines().collect();
    assert_eq!(lines.len(), 3, "header plus one row per file");
    assert!(lines[0].starts_with("relative_path,device_label,device_type,media_class"));
    assert!(lines[1].starts_with("ARU02/clip.wav,ARU02,aru,audio,20,"));
    assert!(lines[2].starts_with("CAM01/photo.jpg,CAM01,camera,image,10,"));
    assert!(lines[1].contains(",R034,S005,20250905,"));

    let manifest_path = staging_root.join(MANIFEST_FILE_NAME);
    let manifest = fs::read_to_string(&manifest_path)?;
    assert_eq!(manifest.lines().count(), 2);
    assert!(manifest.contains("  ./ARU02/clip.wav"));
    assert!(manifest.contains("  ./CAM01/photo.jpg"));
    let expected = hash_file(&staging_root.join("CAM01/photo.jpg"))?;
    assert!(manifest.contains(&expected));

    // Every manifest hash recomputes cleanly against the staged tree.
    let outcome = verify_manifest(&staging_root, &manifest_path)?;
    assert_eq!(outcome.checked, 2);
    assert!(outcome.is_clean());

    let log = fs::read_to_string(staging_root.join("logs").join(RUN_LOG_FILE_NAME))?;
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("reserve=R034 site=S005 deployment=20250905 mode=copy files=2 problems=0"));

    Ok(())
}

#[test]
fn copy_mode_preserves_source_mtime() -> Result<()> {
    let temp = TempDir::new()?;
    let input = example_import(&temp);
    let src = input.join("camera_01/photo.jpg");
    let stamp = filetime::FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&src, stamp)?;
    let options = example_options(input, temp.path().join("staging"), PlaceMode::Copy);

    let report = run_ingest(&options)?;
    assert_eq!(report.counters.problems, 0);

    let staged = PathBuf::from(&report.staging_root).join("CAM01/photo.jpg");
    let staged_mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(&staged)?);
    assert_eq!(staged_mtime, stamp);

    Ok(())
}

#[cfg(unix)]
#[test]
fn unreadable_file_counts_as_problem_but_run_continues() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new()?;
    let input = temp.path().join("import");
    fs::create_dir_all(input.join("ARU_01"))?;
    fs::write(input.join("ARU_01/clip.wav"), b"audio")?;
    let locked = input.join("ARU_01/locked.wav");
    fs::write(&locked, b"sealed")?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
    if fs::File::open(&locked).is_ok() {
        // Permission bits are ignored for privileged users; nothing to test.
        return Ok(());
    }

    let options = IngestOptions {
        compute_hash: true,
        ..example_options(input, temp.path().join("staging"), PlaceMode::Plan)
    };
    let report = run_ingest(&options)?;

    // The hash failure is tallied but both rows are still recorded.
    assert_eq!(report.counters.files, 2);
    assert_eq!(report.counters.problems, 1);
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("failed to hash") && warning.contains("locked.wav")));

    let staging_root = PathBuf::from(&report.staging_root);
    let inventory = fs::read_to_string(staging_root.join(INVENTORY_FILE_NAME))?;
    assert!(inventory.contains("ARU01/locked.wav,ARU01,aru,audio,6,"));

    let manifest = fs::read_to_string(staging_root.join(MANIFEST_FILE_NAME))?;
    assert_eq!(manifest.lines().count(), 1, "only the readable file is hashed");
    assert!(manifest.contains("  ./ARU01/clip.wav"));

    Ok(())
}

#[cfg(unix)]
#[test]
fn symlink_mode_links_back_to_sources() -> Result<()> {
    let temp = TempDir::new()?;
    let input = example_import(&temp);
    let options = example_options(input.clone(), temp.path().join("staging"), PlaceMode::Symlink);

    let report = run_ingest(&options)?;
    let staging_root = PathBuf::from(&report.staging_root);

    let staged = staging_root.join("CAM01/photo.jpg");
    assert!(fs::symlink_metadata(&staged)?.file_type().is_symlink());
    let target = fs::read_link(&staged)?;
    assert_eq!(target, fs::canonicalize(input.join("camera_01/photo.jpg"))?);
    assert_eq!(fs::read(&staged)?, b"0123456789");

    // Re-running replaces the existing links instead of failing.
    let rerun = run_ingest(&options)?;
    assert_eq!(rerun.counters.staged_files, 2);
    assert_eq!(rerun.counters.problems, 0);

    Ok(())
}

#[test]
fn plan_mode_records_metadata_without_placing_files() -> Result<()> {
    let temp = TempDir::new()?;
    let input = example_import(&temp);
    let options = example_options(input, temp.path().join("staging"), PlaceMode::Plan);

    let report = run_ingest(&options)?;
    let staging_root = PathBuf::from(&report.staging_root);

    assert_eq!(report.counters.files, 2);
    assert_eq!(report.counters.planned_files, 2);
    assert_eq!(report.counters.staged_files, 0);
    assert!(!staging_root.join("CAM01/photo.jpg").exists());
    assert!(!staging_root.join("ARU02/clip.wav").exists());

    // Only the artifacts exist under the staging root.
    let files = walkdir::WalkDir::new(&staging_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(&staging_root)
                .expect("relative")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect::<Vec<_>>();
    let mut files = files;
    files.sort();
    assert_eq!(files, vec!["file_inventory.csv", "logs/ingest.log"]);

    let inventory = fs::read_to_string(staging_root.join(INVENTORY_FILE_NAME))?;
    assert_eq!(inventory.lines().count(), 3);

    Ok(())
}

#[test]
fn nested_paths_are_preserved_under_the_device_label() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("import");
    fs::create_dir_all(input.join("camera_01/2025-09-05"))?;
    fs::write(input.join("camera_01/2025-09-05/img_0001.jpg"), b"jpegdata")?;
    let options = example_options(input, temp.path().join("staging"), PlaceMode::Copy);

    let report = run_ingest(&options)?;
    let staging_root = PathBuf::from(&report.staging_root);

    assert!(staging_root.join("CAM01/2025-09-05/img_0001.jpg").exists());
    let inventory = fs::read_to_string(staging_root.join(INVENTORY_FILE_NAME))?;
    assert!(inventory.contains("CAM01/2025-09-05/img_0001.jpg,CAM01,camera,image,8,"));

    Ok(())
}

#[test]
fn duplicate_filenames_within_a_device_warn_but_continue() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("import");
    fs::create_dir_all(input.join("camera_01/card_a"))?;
    fs::create_dir_all(input.join("camera_01/card_b"))?;
    fs::write(input.join("camera_01/card_a/img.jpg"), b"first")?;
    fs::write(input.join("camera_01/card_b/img.jpg"), b"second")?;
    let options = example_options(input, temp.path().join("staging"), PlaceMode::Copy);

    let report = run_ingest(&options)?;

    assert_eq!(report.counters.files, 2);
    assert_eq!(report.counters.duplicate_names, 1);
    assert_eq!(report.counters.problems, 0);
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("duplicate filename in device CAM01")));

    // Relative paths stay unique because the card subfolders differ.
    let staging_root = PathBuf::from(&report.staging_root);
    let inventory = fs::read_to_string(staging_root.join(INVENTORY_FILE_NAME))?;
    assert!(inventory.contains("CAM01/card_a/img.jpg"));
    assert!(inventory.contains("CAM01/card_b/img.jpg"));

    Ok(())
}

#[test]
fn excluded_files_are_skipped_entirely() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("import");
    fs::create_dir_all(input.join("ARU_01"))?;
    fs::write(input.join("ARU_01/clip.wav"), b"audio")?;
    fs::write(input.join("ARU_01/.DS_Store"), b"junk")?;
    let options = IngestOptions {
        excludes: vec![".DS_Store".to_string()],
        ..example_options(input, temp.path().join("staging"), PlaceMode::Copy)
    };

    let report = run_ingest(&options)?;

    assert_eq!(report.counters.files, 1);
    let staging_root = PathBuf::from(&report.staging_root);
    assert!(!staging_root.join("ARU01/.DS_Store").exists());

    Ok(())
}

#[test]
fn zero_devices_warns_and_writes_no_inventory() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("import");
    fs::create_dir_all(&input)?;
    let options = example_options(input, temp.path().join("staging"), PlaceMode::Symlink);

    let report = run_ingest(&options)?;
    let staging_root = PathBuf::from(&report.staging_root);

    assert_eq!(report.counters.files, 0);
    assert!(report.inventory_path.is_none());
    assert!(staging_root.exists(), "directories are still created");
    assert!(!staging_root.join(INVENTORY_FILE_NAME).exists());
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("no device subfolders")));

    Ok(())
}

#[test]
fn missing_input_directory_is_fatal_before_any_output() {
    let temp = TempDir::new().expect("tempdir");
    let staging_base = temp.path().join("staging");
    let options = example_options(
        temp.path().join("does-not-exist"),
        staging_base.clone(),
        PlaceMode::Symlink,
    );

    let result = run_ingest(&options);
    assert!(result.is_err());
    assert!(!staging_base.exists(), "no output before validation passes");
}

#[test]
fn run_log_appends_one_line_per_invocation() -> Result<()> {
    let temp = TempDir::new()?;
    let input = example_import(&temp);
    let options = example_options(input, temp.path().join("staging"), PlaceMode::Plan);

    let first = run_ingest(&options)?;
    run_ingest(&options)?;

    let log_path = Path::new(&first.staging_root)
        .join("logs")
        .join(RUN_LOG_FILE_NAME);
    let log = fs::read_to_string(log_path)?;
    assert_eq!(log.lines().count(), 2);

    Ok(())
}
