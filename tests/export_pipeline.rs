//! End-to-end export through the public API against a temp directory

use idrshot::{
    CapabilitySet, ExportError, ExportRequest, ExportSession, ExportStatus, ExtractionMode, Frame,
    FrameSource, Macroblock, PictureFormat, RawYuvSource, plan,
};
use std::path::Path;

fn session(dir: &Path, caps: CapabilitySet) -> ExportSession {
    ExportSession::new(caps).with_source(&dir.join("stream.yuv"))
}

/// Horizontal luma ramp with flat chroma
fn ramp_frame(width_mb: usize, height_mb: usize) -> Frame {
    let mut frame = Frame::new(width_mb, height_mb);
    for mb_y in 0..height_mb {
        for mb_x in 0..width_mb {
            let mut mb = Macroblock::filled(0, 110, 150);
            for (i, s) in mb.luma.iter_mut().enumerate() {
                *s = (16 + (mb_x * 16 + i % 16) % 220) as u8;
            }
            frame.set(mb_x, mb_y, mb);
        }
    }
    frame
}

#[test]
fn test_yuv420_byte_count() {
    let tmp = tempfile::tempdir().unwrap();
    let s = session(tmp.path(), CapabilitySet::all());
    let frame = Frame::solid(32, 16, 16, 128, 128);

    let r = s.export(&frame, &ExportRequest::new(PictureFormat::Yuv420, "raw"));
    assert_eq!(r.status, ExportStatus::Success);
    assert_eq!(r.bytes_written, 512 * 256 + 2 * (512 * 256 / 4));
    assert_eq!(std::fs::metadata(&r.path).unwrap().len(), 196_608);
}

#[test]
fn test_every_format_reads_back() {
    let tmp = tempfile::tempdir().unwrap();
    let s = session(tmp.path(), CapabilitySet::all());
    let frame = ramp_frame(4, 2);

    for (format, image_format) in [
        (PictureFormat::Jpg, image::ImageFormat::Jpeg),
        (PictureFormat::Png, image::ImageFormat::Png),
        (PictureFormat::Bmp, image::ImageFormat::Bmp),
        (PictureFormat::Tga, image::ImageFormat::Tga),
        (PictureFormat::Webp, image::ImageFormat::WebP),
    ] {
        let r = s.export(&frame, &ExportRequest::new(format, "ramp"));
        assert_eq!(r.status, ExportStatus::Success, "{:?}: {:?}", format, r.error);
        let bytes = std::fs::read(&r.path).unwrap();
        let img = image::load_from_memory_with_format(&bytes, image_format).unwrap();
        assert_eq!((img.width(), img.height()), (64, 32), "{}", format);
    }
}

#[test]
fn test_generic_writer_serves_jpg_and_png() {
    let tmp = tempfile::tempdir().unwrap();
    let caps = CapabilitySet {
        has_generic_writer: true,
        ..CapabilitySet::none()
    };
    let s = session(tmp.path(), caps);
    let frame = ramp_frame(2, 2);

    let jpg = s.export(&frame, &ExportRequest::new(PictureFormat::Jpg, "g"));
    assert_eq!(jpg.backend, "image");
    let png = s.export(&frame, &ExportRequest::new(PictureFormat::Png, "g"));
    assert_eq!(png.backend, "image");
    let img = image::open(&png.path).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (32, 32));
}

#[test]
fn test_batch_paths_are_distinct_and_repeatable() {
    let tmp = tempfile::tempdir().unwrap();
    let (w, h) = (32, 16);
    let path = tmp.path().join("clip.yuv");
    let mut data = Vec::new();
    for i in 0..3u8 {
        data.extend(std::iter::repeat_n(40 + i * 50, w * h));
        data.extend(std::iter::repeat_n(128, w * h / 2));
    }
    std::fs::write(&path, data).unwrap();

    let source = RawYuvSource::open(&path, w, h).unwrap();
    let indices = plan(&source, ExtractionMode::Ordered, 3);
    assert_eq!(indices, vec![0, 1, 2]);

    let template = ExportRequest::new(PictureFormat::Png, "shot");
    let run = |parallel: bool| {
        let s = ExportSession::new(CapabilitySet::all()).with_source(source.path());
        let summary = s.export_batch(&source, &indices, &template, parallel);
        assert!(summary.all_written());
        assert_eq!(s.exported_count(), 3);
        summary.results.into_iter().map(|r| r.path).collect::<Vec<_>>()
    };

    let first = run(true);
    let names: Vec<_> = first.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
    assert_eq!(names, vec!["shot_1.png", "shot_2.png", "shot_3.png"]);
    assert!(first.iter().all(|p| p.parent() == Some(tmp.path())));
    assert_eq!(run(false), first);
}

#[test]
fn test_all_missing_fails_for_every_format() {
    let tmp = tempfile::tempdir().unwrap();
    let s = session(tmp.path(), CapabilitySet::all());
    let frame = Frame::new(4, 4);

    for &format in PictureFormat::all() {
        let r = s.export(&frame, &ExportRequest::new(format, "empty"));
        assert_eq!(r.status, ExportStatus::Failure);
        assert_eq!(r.missing_mb_count, 16);
        assert_eq!(r.bytes_written, 0);
    }
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_partial_frame_is_zero_filled() {
    let tmp = tempfile::tempdir().unwrap();
    let s = session(tmp.path(), CapabilitySet::all());
    let mut frame = Frame::solid(2, 1, 200, 128, 128);
    frame.clear(0, 0);

    let r = s.export(&frame, &ExportRequest::new(PictureFormat::Yuv420, "half"));
    assert_eq!(r.status, ExportStatus::PartialSuccess);
    assert_eq!(r.missing_mb_count, 1);

    let bytes = std::fs::read(&r.path).unwrap();
    // First luma row: 16 zeroed samples then 16 decoded ones
    assert!(bytes[..16].iter().all(|&s| s == 0));
    assert!(bytes[16..32].iter().all(|&s| s == 200));
}

#[test]
fn test_sink_open_failure_skips_encoder() {
    let tmp = tempfile::tempdir().unwrap();
    let s = session(tmp.path(), CapabilitySet::all());
    let blocker = tmp.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();

    let req = ExportRequest::new(PictureFormat::Png, "out").with_output_dir(blocker.join("sub"));
    let r = s.export(&Frame::solid(1, 1, 16, 128, 128), &req);
    assert_eq!(r.status, ExportStatus::Failure);
    assert!(matches!(r.error, Some(ExportError::SinkOpenFailure { .. })));
    assert_eq!(s.exported_count(), 0);
}

#[test]
fn test_no_backends_downgrades_to_yuv() {
    let tmp = tempfile::tempdir().unwrap();
    let s = session(tmp.path(), CapabilitySet::none());
    let frame = Frame::solid(2, 2, 16, 128, 128);

    for format in [PictureFormat::Webp, PictureFormat::Jpg, PictureFormat::Bmp] {
        let r = s.export(&frame, &ExportRequest::new(format, "fallback"));
        assert_eq!(r.status, ExportStatus::Success);
        assert_eq!(r.format, PictureFormat::Yuv420);
        assert_eq!(r.path, tmp.path().join("fallback.yuv"));
        assert_eq!(r.bytes_written, 32 * 32 * 3 / 2);
    }
}
