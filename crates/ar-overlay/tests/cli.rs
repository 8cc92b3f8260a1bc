#![cfg(feature = "cli")]

use ar_overlay::aruco::{Dictionary, DictionaryKind};
use ar_overlay::OverlayConfig;
use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn write_codebook(dir: &Path) -> PathBuf {
    let codes = (0..50u64).map(|i| (i * 1237 + 91) & 0xffff).collect();
    let dict = Dictionary::new(DictionaryKind::Dict4x4_50, 1, codes).expect("dictionary");
    let path = dir.join("DICT_4X4_50.json");
    dict.write_json(&path).expect("write codebook");
    path
}

fn cli() -> Command {
    Command::cargo_bin("ar-overlay").expect("binary")
}

#[test]
fn help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("marker")));
}

#[test]
fn missing_config_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    cli()
        .args(["run", "--config"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure();
}

#[test]
fn marker_subcommand_writes_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let book = write_codebook(dir.path());
    let out = dir.path().join("m.png");

    cli()
        .args(["marker", "--id", "3", "--cell-px", "5", "--codebook"])
        .arg(&book)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let img = image::open(&out).expect("marker image").to_luma8();
    // 4 bits + 2 border + 2 quiet zone cells
    assert_eq!(img.dimensions(), (40, 40));
    assert_eq!(img.get_pixel(0, 0).0, [255]);
    assert_eq!(img.get_pixel(6, 6).0, [0]);
}

#[test]
fn log_level_is_parsed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let book = write_codebook(dir.path());
    cli()
        .args(["--log-level", "debug", "marker", "--id", "0", "--codebook"])
        .arg(&book)
        .arg("--out")
        .arg(dir.path().join("m.png"))
        .assert()
        .success();

    cli()
        .args(["--log-level", "loud", "marker", "--id", "0", "--codebook"])
        .arg(&book)
        .arg("--out")
        .arg(dir.path().join("n.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--log-level"));
}

#[test]
fn marker_subcommand_rejects_unknown_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let book = write_codebook(dir.path());
    cli()
        .args(["marker", "--id", "50", "--codebook"])
        .arg(&book)
        .arg("--out")
        .arg(dir.path().join("m.png"))
        .assert()
        .failure();
}

#[test]
fn run_writes_every_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let frames = root.join("frames");
    let assets = root.join("assets");
    fs::create_dir(&frames).expect("mkdir");
    fs::create_dir(&assets).expect("mkdir");
    for name in ["a.png", "b.png"] {
        RgbImage::from_pixel(32, 24, Rgb([200, 200, 200]))
            .save(frames.join(name))
            .expect("save frame");
    }

    let mut cfg = OverlayConfig::new(&frames, &assets, write_codebook(root));
    cfg.dictionary.marker_size = 4;
    cfg.dictionary.total_markers = 50;
    cfg.wait_ms = 0;
    let cfg_path = root.join("run.json");
    cfg.write_json(&cfg_path).expect("write config");

    let out = root.join("out");
    cli()
        .args(["--log-level", "off", "run", "--config"])
        .arg(&cfg_path)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 frames"));

    assert!(out.join("frame_000000.png").is_file());
    assert!(out.join("frame_000001.png").is_file());
}

#[test]
fn run_rejects_mismatched_dictionary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let cfg = OverlayConfig::new(root, root, write_codebook(root));
    let cfg_path = root.join("run.json");
    cfg.write_json(&cfg_path).expect("write config");

    // default selection is 6x6/250, the codebook is 4x4/50
    cli()
        .args(["run", "--config"])
        .arg(&cfg_path)
        .assert()
        .failure();

    cli()
        .args(["run", "--marker-size", "4", "--total-markers", "50", "--config"])
        .arg(&cfg_path)
        .assert()
        .success();
}
