use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use image::{Rgb, RgbImage};
use tempfile::tempdir;

fn write_image(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([12, 34, 56]))
        .save(path)
        .unwrap();
}

fn cli() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_image-ranker"));
    cmd.env_remove("OPENROUTER_API_KEY").env_remove("RUST_LOG");
    cmd
}

fn run_with_stdin(mut cmd: Command, input: impl AsRef<[u8]>) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_ref())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn list_prints_sorted_images() {
    let dir = tempdir().unwrap();
    for name in ["b.png", "a.jpg", "c.bmp"] {
        write_image(&dir.path().join(name), 4, 4);
    }
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

    let out = cli().arg("list").arg("--folder").arg(dir.path()).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["a.jpg", "b.png", "c.bmp"]);
}

#[test]
fn list_rejects_folder_with_one_image() {
    let dir = tempdir().unwrap();
    write_image(&dir.path().join("only.png"), 4, 4);

    let out = cli().arg("list").arg("--folder").arg(dir.path()).output().unwrap();
    assert!(!out.status.success());
}

#[test]
fn session_votes_and_exports_csv() {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        write_image(&images.join(name), 8, 8);
    }
    let csv = dir.path().join("rank.csv");
    let trace = dir.path().join("votes.jsonl");

    let mut cmd = cli();
    cmd.arg("session")
        .arg("--folder")
        .arg(&images)
        .arg("--out")
        .arg(&csv)
        .arg("--trace")
        .arg(&trace)
        .args(["--seed", "7"]);
    let out = run_with_stdin(cmd, "l\nr\nl\ne\nq\n");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("Ranking 3 images"));
    assert!(stdout.contains("Ranking exported to"));

    // No API key in the environment: the session still runs, without AI.
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("AI evaluation unavailable"));

    let raw = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "rank,image_name,votes");
    let total: u32 = lines[1..]
        .iter()
        .map(|l| l.rsplit(',').next().unwrap().parse::<u32>().unwrap())
        .sum();
    assert_eq!(total, 3);

    let traced = std::fs::read_to_string(&trace).unwrap();
    assert_eq!(traced.lines().count(), 3);
}

#[test]
fn session_with_same_seed_is_reproducible() {
    let dir = tempdir().unwrap();
    for name in ["a.png", "b.png", "c.png", "d.png"] {
        write_image(&dir.path().join(name), 8, 8);
    }

    let transcript = || {
        let mut cmd = cli();
        cmd.arg("session")
            .arg("--folder")
            .arg(dir.path())
            .args(["--seed", "99", "--no-ai"]);
        let out = run_with_stdin(cmd, "l\nl\nr\ns\nq\n");
        assert!(out.status.success());
        String::from_utf8(out.stdout).unwrap()
    };
    assert_eq!(transcript(), transcript());
}

#[test]
fn failed_session_still_flushes_the_trace() {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        write_image(&images.join(name), 8, 8);
    }
    let trace = dir.path().join("votes.jsonl");

    let mut cmd = cli();
    cmd.arg("session")
        .arg("--folder")
        .arg(&images)
        .arg("--trace")
        .arg(&trace)
        .args(["--seed", "3", "--no-ai"]);
    // Two votes, then a line that is not UTF-8 aborts the terminal loop.
    let out = run_with_stdin(cmd, b"l\nr\n\xff\xfe\n");
    assert!(!out.status.success());

    let traced = std::fs::read_to_string(&trace).unwrap();
    assert_eq!(traced.lines().count(), 2);
}

#[test]
fn thumbnail_writes_bounded_png() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("wide.png");
    write_image(&src, 1000, 250);
    let dst = dir.path().join("thumb.png");

    let out = cli()
        .arg("thumbnail")
        .arg("--image")
        .arg(&src)
        .arg("--out")
        .arg(&dst)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(image::image_dimensions(&dst).unwrap(), (720, 180));
}

#[test]
fn rate_without_api_key_fails_with_a_hint() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("a.png");
    write_image(&src, 8, 8);

    let out = cli().arg("rate").arg("--image").arg(&src).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("OPENROUTER_API_KEY"));
}
