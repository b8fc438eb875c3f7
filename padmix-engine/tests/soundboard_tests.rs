//! Soundboard integration tests: pads through the cache into the mixer

mod helpers;

use helpers::{generate_sine_wav, output_device, FakeDecoder, FakeHost};
use padmix_common::StreamRole;
use padmix_engine::audio::SymphoniaDecoder;
use padmix_engine::{EngineConfig, Error, Soundboard};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const CABLE: usize = 0;
const SPEAKERS: usize = 1;
const CABLE_44K: usize = 2;

fn host() -> FakeHost {
    FakeHost::new(vec![
        output_device(CABLE, "CABLE Input", 48000),
        output_device(SPEAKERS, "Speakers", 48000),
        output_device(CABLE_44K, "Interface Out", 44100),
    ])
}

fn pad_files(dir: &TempDir, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.path().join(format!("pad{}.wav", i));
            std::fs::write(&path, b"x").unwrap();
            path
        })
        .collect()
}

fn board(host: &FakeHost, decoder: Arc<FakeDecoder>) -> Soundboard {
    Soundboard::new(Box::new(host.clone()), decoder, &EngineConfig::default())
}

#[test]
fn test_play_needs_primary_output() {
    let dir = TempDir::new().unwrap();
    let host = host();
    let mut board = board(&host, Arc::new(FakeDecoder::new(100)));
    for path in pad_files(&dir, 1) {
        board.add_pad(path);
    }

    assert!(matches!(board.play_pad(0), Err(Error::NoOutputDevice)));
    assert!(matches!(board.play_pad(5), Err(Error::InvalidInput(_))));
}

#[test]
fn test_exclusive_playback_replaces_clip() {
    let dir = TempDir::new().unwrap();
    let host = host();
    let mut board = board(&host, Arc::new(FakeDecoder::new(10_000)));
    for path in pad_files(&dir, 2) {
        board.add_pad(path);
    }
    board.set_devices(None, Some(CABLE), Some(SPEAKERS));

    board.play_pad(0).unwrap();
    let second = board.play_pad(1).unwrap();

    let status = board.bus().clip_status();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].id, second);
}

#[test]
fn test_overlapping_playback_when_not_exclusive() {
    let dir = TempDir::new().unwrap();
    let host = host();
    let mut board = board(&host, Arc::new(FakeDecoder::new(10_000)));
    for path in pad_files(&dir, 2) {
        board.add_pad(path);
    }
    board.set_exclusive(false);
    board.set_devices(None, Some(CABLE), None);

    board.play_pad(0).unwrap();
    board.play_pad(1).unwrap();
    assert_eq!(board.bus().active_clips(), 2);

    // 0.25 + 0.25 from the fake decoder level
    let out = host.drive_output(StreamRole::Primary, 8).unwrap();
    assert!(out.iter().all(|&s| s == 0.5));

    assert_eq!(board.stop_all(), 2);
}

#[test]
fn test_stale_cache_target_is_corrected() {
    let dir = TempDir::new().unwrap();
    let host = host();
    let decoder = Arc::new(FakeDecoder::new(100));
    let mut board = board(&host, decoder.clone());
    for path in pad_files(&dir, 1) {
        board.add_pad(path);
    }
    board.set_devices(None, Some(CABLE_44K), None);
    assert_eq!(board.cache().target().sample_rate, 44100);

    // Something else re-targeted the cache behind the mixer's back
    board.cache().set_target(48000, 2);

    board.play_pad(0).unwrap();
    assert_eq!(board.cache().target().sample_rate, 44100);
    assert_eq!(decoder.calls(), 2);
    assert_eq!(board.bus().active_clips(), 1);
}

#[test]
fn test_warm_up_fills_cache() {
    let dir = TempDir::new().unwrap();
    let host = host();
    let decoder = Arc::new(FakeDecoder::new(100));
    let mut board = board(&host, decoder.clone());
    for path in pad_files(&dir, 3) {
        board.add_pad(path);
    }

    assert_eq!(board.warm_up().unwrap(), 3);
    let stats = board.wait_warm();
    assert_eq!((stats.total, stats.completed, stats.failed), (3, 3, 0));
    assert_eq!(board.cache().len(), 3);

    board.set_devices(None, Some(CABLE), None);
    board.play_pad(2).unwrap();
    assert_eq!(decoder.calls(), 3);
}

#[test]
fn test_pad_list_management() {
    let host = host();
    let mut board = board(&host, Arc::new(FakeDecoder::new(1)));

    assert_eq!(board.add_pad("/sounds/drum roll.ogg"), 0);
    assert_eq!(board.add_pad("/sounds/applause.flac"), 1);
    assert_eq!(board.pads()[0].name, "drum roll");
    assert_eq!(board.pads()[1].name, "applause");

    board.clear_pads();
    assert!(board.pads().is_empty());
}

#[test]
fn test_shutdown_closes_streams() {
    let host = host();
    let mut board = board(&host, Arc::new(FakeDecoder::new(1)));
    board.set_devices(None, Some(CABLE), Some(SPEAKERS));
    assert!(host.is_open(StreamRole::Primary));

    board.shutdown();
    assert!(!host.is_open(StreamRole::Primary));
    assert!(!host.is_open(StreamRole::Monitor));
    assert!(board.warm_up().is_err());
}

#[test]
fn test_real_file_plays_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    generate_sine_wav(&path, 48000, 1, 100, 0.5).unwrap();

    let host = host();
    let mut board = Soundboard::new(
        Box::new(host.clone()),
        Arc::new(SymphoniaDecoder::new()),
        &EngineConfig::default(),
    );
    board.set_devices(None, Some(CABLE), None);
    board.add_pad(&path);

    board.play_pad(0).unwrap();
    let status = board.bus().clip_status();
    assert_eq!(status[0].frames, 4800);

    let out = host.drive_output(StreamRole::Primary, 256).unwrap();
    assert!(out.iter().any(|&s| s.abs() > 0.1));
    assert!(out.chunks_exact(2).all(|f| f[0] == f[1]));
}
