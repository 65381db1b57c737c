//! Keyframe export integration tests.

use std::{fs, path::Path};

use image::{DynamicImage, Rgba, RgbaImage, RgbImage};
use scenecut::{
    DetectionConfig, Frame, KeyframeExporter, KeyframeFormat,
    export::{output_directory, video_base_name},
};

fn frame(index: u64) -> Frame {
    Frame::new(index, DynamicImage::ImageRgb8(RgbImage::new(12, 8)))
}

// ── Naming ────────────────────────────────────────────────────────

#[test]
fn keyframe_names_are_zero_padded() {
    let exporter = KeyframeExporter::new(Path::new("out"), Path::new("videos/clip.mp4"), KeyframeFormat::Jpeg);
    assert_eq!(exporter.directory(), Path::new("out/Output_clip"));
    assert_eq!(exporter.keyframe_path(5), Path::new("out/Output_clip/clip_0005.jpg"));
    assert_eq!(exporter.keyframe_path(12345), Path::new("out/Output_clip/clip_12345.jpg"));
}

#[test]
fn base_name_drops_only_the_last_extension() {
    assert_eq!(video_base_name(Path::new("/a/b/movie.final.mkv")), "movie.final");
    assert_eq!(video_base_name(Path::new("noext")), "noext");
    assert_eq!(
        output_directory(Path::new("root"), Path::new("x/trip.MOV")),
        Path::new("root/Output_trip")
    );
}

#[test]
fn format_extensions() {
    assert_eq!(KeyframeFormat::default(), KeyframeFormat::Jpeg);
    assert_eq!(KeyframeFormat::from_extension(".PNG"), Some(KeyframeFormat::Png));
    assert_eq!(KeyframeFormat::from_extension("tif"), Some(KeyframeFormat::Tiff));
    assert_eq!(KeyframeFormat::from_extension("gif"), None);
    assert_eq!(KeyframeFormat::WebP.extension(), "webp");
}

// ── Writing ───────────────────────────────────────────────────────

#[test]
fn directory_is_created_on_first_export() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("a").join("b");
    let mut exporter = KeyframeExporter::new(&nested, Path::new("clip.mp4"), KeyframeFormat::Png);
    assert!(!exporter.directory().exists());

    let path = exporter.export(&frame(7)).unwrap();
    assert_eq!(path, nested.join("Output_clip").join("clip_0007.png"));
    assert!(path.is_file());

    let written = image::open(&path).unwrap();
    assert_eq!((written.width(), written.height()), (12, 8));
}

#[test]
fn rerun_into_non_empty_directory_keeps_prior_files() {
    let root = tempfile::tempdir().unwrap();
    let config = DetectionConfig::new("clip.mp4", root.path());
    let directory = root.path().join("Output_clip");
    fs::create_dir_all(&directory).unwrap();
    fs::write(directory.join("notes.txt"), b"keep me").unwrap();

    let mut first = KeyframeExporter::from_config(&config);
    first.export(&frame(3)).unwrap();

    let mut second = KeyframeExporter::from_config(&config);
    second.export(&frame(3)).unwrap();
    second.export(&frame(40)).unwrap();

    let mut names: Vec<_> = fs::read_dir(&directory)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["clip_0003.jpg", "clip_0040.jpg", "notes.txt"]);
    assert_eq!(fs::read(directory.join("notes.txt")).unwrap(), b"keep me");
}

#[test]
fn transparent_frames_export_as_jpeg() {
    let root = tempfile::tempdir().unwrap();
    let mut exporter = KeyframeExporter::new(root.path(), Path::new("alpha.webm"), KeyframeFormat::Jpeg);
    let rgba = Frame::new(
        0,
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 128]))),
    );

    let path = exporter.export(&rgba).unwrap();
    assert!(path.is_file());
}

#[test]
fn unwritable_directory_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("file");
    fs::write(&blocker, b"not a directory").unwrap();

    let mut exporter = KeyframeExporter::new(&blocker, Path::new("clip.mp4"), KeyframeFormat::Png);
    assert!(exporter.export(&frame(1)).is_err());
}
