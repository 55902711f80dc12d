use std::process::Command;

fn main() {
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = Command::new("git")
        .args(&["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .unwrap_or_else(|| "".to_string());
    let git_hash = git_hash.trim();
    if git_hash.is_empty() {
        println!("cargo:rustc-env=VERSION_STRING={}", version);
    } else {
        println!("cargo:rustc-env=VERSION_STRING={}-{}", version, git_hash);
    }
}
