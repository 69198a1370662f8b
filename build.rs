use std::process::Command;
use vergen::EmitBuilder;

fn main() {
    let in_git_repo = Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);

    let mut builder = EmitBuilder::builder();
    builder.build_timestamp();
    if in_git_repo {
        builder.git_sha(false);
    }

    // Version info is best-effort; a build without it still works, the
    // /api/version endpoint falls back to "unknown".
    if let Err(e) = builder.emit() {
        println!("cargo:warning=could not emit build metadata: {e}");
    }
}
