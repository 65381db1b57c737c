//! Finding videos for a batch.
//!
//! [`find_videos`] walks a directory tree and collects every file with a
//! known video extension. [`plan_batch`] turns the result into one
//! [`DetectionConfig`] per video, mirroring each video's sub-directory under
//! the output root so that equally named videos in different folders do not
//! share an `Output_` directory.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{
    configuration::{DetectionConfig, is_video_path},
    error::ScenecutError,
};

/// All video files below `root`, sorted by path.
///
/// Symbolic links are not followed. Entries that cannot be read are skipped
/// with a warning. A `root` that is itself a video file yields just that file.
///
/// # Errors
///
/// Returns [`ScenecutError::IoError`] if `root` does not exist.
pub fn find_videos(root: &Path) -> Result<Vec<PathBuf>, ScenecutError> {
    std::fs::metadata(root)?;

    let mut videos: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                log::warn!("Skipping unreadable entry: {error}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_video_path(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    videos.sort();
    log::debug!("Found {} video(s) under {}", videos.len(), root.display());
    Ok(videos)
}

/// One configuration per video found under `input_root`.
///
/// Every config copies the detection settings of `template`; its input path
/// is the video and its output root is `output_root` joined with the video's
/// parent directory relative to `input_root`.
///
/// # Errors
///
/// Returns [`ScenecutError::IoError`] if `input_root` does not exist.
pub fn plan_batch(
    input_root: &Path,
    output_root: &Path,
    template: &DetectionConfig,
) -> Result<Vec<DetectionConfig>, ScenecutError> {
    let videos = find_videos(input_root)?;
    Ok(videos
        .into_iter()
        .map(|video| {
            let relative_parent = video
                .parent()
                .and_then(|parent| parent.strip_prefix(input_root).ok())
                .unwrap_or_else(|| Path::new(""));
            DetectionConfig {
                output_root: output_root.join(relative_parent),
                input_path: video,
                ..template.clone()
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn finds_videos_recursively_and_sorted() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("b.MKV"));
        touch(&root.path().join("a.mp4"));
        touch(&root.path().join("notes.txt"));
        touch(&root.path().join("nested/c.webm"));

        let found = find_videos(root.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|path| path.strip_prefix(root.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a.mp4"),
                PathBuf::from("b.MKV"),
                PathBuf::from("nested/c.webm"),
            ]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let result = find_videos(&root.path().join("absent"));
        assert!(matches!(result, Err(ScenecutError::IoError(_))));
    }

    #[test]
    fn plan_mirrors_sub_directories() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("top.mp4"));
        touch(&root.path().join("day1/clip.mov"));

        let template = DetectionConfig::new("unused", "unused").with_change_threshold(42.0);
        let plan = plan_batch(root.path(), Path::new("/out"), &template).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].output_root(), Path::new("/out/day1"));
        assert!(plan[0].input_path().ends_with("day1/clip.mov"));
        assert_eq!(plan[1].output_root(), Path::new("/out"));
        assert_eq!(plan[1].change_threshold(), 42.0);
    }
}
