//! Watch mode against files edited on disk.
//!
//! Every test bundles with a real process, saves a file the way an editor
//! would and waits for the refreshed record on the destination.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bro::{
    BroOptions, BroStage, CommandBundlerFactory, CommandSpec, Destination, FileRecord,
    MemorySink, PipelineEvent, bro,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const TIMEOUT: Duration = Duration::from_secs(10);

// Every file event rebundles, so a save seen half-written is followed by
// another run; `next_bundle` skips the intermediate records.
fn watching(spec: CommandSpec) -> BroStage {
    let options = BroOptions::new()
        .watch(true)
        .debounce(Duration::ZERO)
        .color(false)
        .log_sink(MemorySink::new());
    bro(CommandBundlerFactory::new(spec), options)
}

fn project(entry: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("main.js"), entry).unwrap();
    (temp, src)
}

/// Save the way vim and most IDEs do: write a sibling, rename it over.
fn save_by_rename(path: &Path, contents: &str) {
    let name = path.file_name().unwrap().to_string_lossy();
    let swap = path.with_file_name(format!(".{}.swp", name));
    fs::write(&swap, contents).unwrap();
    fs::rename(&swap, path).unwrap();
}

async fn next_bundle(rx: &mut UnboundedReceiver<PipelineEvent>, expected: &str) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .unwrap_or_else(|_| panic!("no bundle with {:?} before timeout", expected));
        match event {
            Some(PipelineEvent::Record(record)) if record.contents_bytes() == expected.as_bytes() => {
                return;
            }
            Some(_) => continue,
            None => panic!("destination closed while waiting for {:?}", expected),
        }
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_plain_write_rebundles() {
    let (_temp, src) = project("v1");
    let main = src.join("main.js");
    let mut stage = watching(CommandSpec::new("cat", ["{entry}"]));
    let (destination, mut rx) = Destination::channel();

    let first = stage
        .transform(FileRecord::from_path(&main, &src), &destination)
        .await
        .expect("first bundle");
    assert_eq!(first.contents_bytes(), b"v1");
    settle().await;

    fs::write(&main, "v2").unwrap();
    next_bundle(&mut rx, "v2").await;

    stage.dispose();
}

#[tokio::test]
async fn test_rename_over_save_keeps_watching() {
    let (_temp, src) = project("v1");
    let main = src.join("main.js");
    let mut stage = watching(CommandSpec::new("cat", ["{entry}"]));
    let (destination, mut rx) = Destination::channel();

    stage
        .transform(FileRecord::from_path(&main, &src), &destination)
        .await
        .expect("first bundle");
    settle().await;

    for version in ["v2", "v3", "v4"] {
        save_by_rename(&main, version);
        next_bundle(&mut rx, version).await;
        settle().await;
    }

    stage.dispose();
}

#[tokio::test]
async fn test_declared_dependency_edit_rebundles() {
    let (_temp, src) = project("main;");
    let dep = src.join("dep.js");
    fs::write(&dep, "dep1;").unwrap();

    let spec = CommandSpec::new("sh", ["-c", "cat - dep.js"]).watch(["dep.js"]);
    let mut stage = watching(spec);
    let (destination, mut rx) = Destination::channel();

    let first = stage
        .transform(
            FileRecord::with_contents(src.join("main.js"), &src, "main;"),
            &destination,
        )
        .await
        .expect("first bundle");
    assert_eq!(first.contents_bytes(), b"main;dep1;");
    settle().await;

    save_by_rename(&dep, "dep2;");
    next_bundle(&mut rx, "main;dep2;").await;

    stage.dispose();
}

#[tokio::test]
async fn test_in_memory_entry_reloaded_on_save() {
    let (_temp, src) = project("v1");
    let main = src.join("main.js");
    let mut stage = watching(CommandSpec::new("cat", Vec::<String>::new()));
    let (destination, mut rx) = Destination::channel();

    let first = stage
        .transform(FileRecord::with_contents(&main, &src, "v1"), &destination)
        .await
        .expect("first bundle");
    assert_eq!(first.contents_bytes(), b"v1");
    settle().await;

    save_by_rename(&main, "v2");
    next_bundle(&mut rx, "v2").await;

    stage.dispose();
}

#[tokio::test]
async fn test_file_in_watched_directory_rebundles() {
    let (_temp, src) = project("main;");
    let lib = src.join("lib");
    fs::create_dir_all(lib.join("util")).unwrap();
    fs::write(lib.join("util/a.js"), "a1;").unwrap();

    let spec = CommandSpec::new("sh", ["-c", "cat {entry} lib/util/a.js"]).watch([&lib]);
    let mut stage = watching(spec);
    let (destination, mut rx) = Destination::channel();

    let first = stage
        .transform(
            FileRecord::with_contents(src.join("main.js"), &src, "main;"),
            &destination,
        )
        .await
        .expect("first bundle");
    assert_eq!(first.contents_bytes(), b"main;a1;");
    settle().await;

    fs::write(lib.join("util/a.js"), "a2;").unwrap();
    next_bundle(&mut rx, "main;a2;").await;

    stage.dispose();
}
