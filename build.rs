// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=PHOTOBOOTH_VERSION");

    // Packaged builds pin the version explicitly
    let version = match std::env::var("PHOTOBOOTH_VERSION") {
        Ok(v) => v,
        Err(_) => get_git_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_git_version() -> String {
    // "v0.1.0" at a tag, "v0.1.0-5-gabcdef1" after it, bare hash without tags
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    let described = match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => {
            // Not a git checkout (e.g. a source tarball)
            return env!("CARGO_PKG_VERSION").to_string();
        }
    };

    let described = described.strip_prefix('v').unwrap_or(&described);

    // "0.1.0-5-gabcdef1" becomes "0.1.0-dirty-abcdef1"
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if parts.len() == 3 {
        let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
        format!("{}-dirty-{}", parts[2], hash)
    } else if described.contains('.') {
        described.to_string()
    } else {
        // Only a commit hash, no release tag yet
        format!("{}-{}", env!("CARGO_PKG_VERSION"), described)
    }
}
