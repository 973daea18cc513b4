pub mod classify;
pub mod device;
pub mod ingest;
pub mod inventory;
pub mod layout;
pub mod manifest;
pub mod model;

pub use classify::media_class_for;
pub use device::{discover_devices, infer_device_type, normalize_label};
pub use ingest::{run_ingest, IngestOptions};
pub use inventory::write_inventory;
pub use layout::{deployment_year, remote_destination, resolve_layout, StagingLayout};
pub use manifest::{
    hash_file, read_manifest, verify_manifest, write_manifest, VerifyOutcome,
};
pub use model::{
    Device, DeviceSummary, DeviceType, FileIssue, IngestReport, InventoryRow, ManifestEntry,
    MediaClass, PlaceMode, PlacementOutcome, RunContext, RunCounters, INVENTORY_FILE_NAME,
    MANIFEST_FILE_NAME, REPORT_VERSION, RUN_LOG_FILE_NAME,
};
