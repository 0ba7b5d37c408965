//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Build script; generates the version string included in program output and in `Parameters_results.txt`.
//!

use chrono::prelude::Utc;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let output_dir = std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let version_path = std::path::Path::new(&output_dir).join("version");

    let version_str = format!(
        "{} {} (commit {}, {} {}, built on {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        commit_hash().unwrap_or_else(|| "unspecified".to_string()),
        std::env::consts::OS, std::env::consts::ARCH,
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    );

    std::fs::write(&version_path, version_str)
        .unwrap_or_else(|err| panic!("cannot write {}: {}", version_path.display(), err));
}

/// Returns the abbreviated hash of the current commit; `None` outside a git checkout or without git.
fn commit_hash() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(&["rev-parse", "--short=8", "HEAD"])
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
