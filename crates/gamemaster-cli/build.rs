use std::process::Command;

/// Run git with `args`, returning trimmed stdout on success
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|out| out.trim().to_string())
}

fn main() {
    let version = env!("CARGO_PKG_VERSION");

    // Release builds report the crate version, everything else the commit
    let version_str = if std::env::var("PROFILE").as_deref() == Ok("release") {
        version.to_string()
    } else {
        let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
        let dirty = Command::new("git")
            .args(["diff-index", "--quiet", "HEAD"])
            .status()
            .map(|status| !status.success())
            .unwrap_or(false);
        if dirty {
            format!("{version}+{hash}-dirty")
        } else {
            format!("{version}+{hash}")
        }
    };

    println!("cargo:rustc-env=VERSION_STRING={}", version_str);
}
