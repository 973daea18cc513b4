use std::path::Path;

use crate::model::MediaClass;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "cr2", "nef", "arw", "dng"];
const AUDIO_EXTS: &[&str] = &["wav", "flac"];
const VIDEO_EXTS: &[&str] = &["mp4", "mov", "avi"];

/// Coarse media class by file extension, recorded as `media_class` in the
/// inventory.
pub fn media_class_for(path: &Path) -> MediaClass {
    let extension = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => ext.to_lowercase(),
        None => return MediaClass::Other,
    };

    if IMAGE_EXTS.contains(&extension.as_str()) {
        MediaClass::Image
    } else if AUDIO_EXTS.contains(&extension.as_str()) {
        MediaClass::Audio
    } else if VIDEO_EXTS.contains(&extension.as_str()) {
        MediaClass::Video
    } else {
        MediaClass::Other
    }
}
