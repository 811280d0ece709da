//! Applying handin patches to the working tree.
//!
//! Mailbox-format patches (`git format-patch` output) have no libgit2
//! analogue, so this is the one operation that shells out to the `git`
//! CLI. Patch content is not validated here; a patch that does not apply
//! is reported and skipped, never escalated to manual recovery.

use std::path::Path;
use std::process::Command;

use crate::vcs::git::Repository;

impl Repository {
    /// Apply the mailbox patch at `patch_path` to the working tree with
    /// `git am`.
    ///
    /// Returns `true` on success. On any failure the underlying error is
    /// printed for the grader and `false` is returned; the working tree is
    /// left for `git am --abort`/manual cleanup if the apply stopped
    /// halfway.
    pub fn apply_patch(&self, patch_path: impl AsRef<Path>) -> bool {
        let workdir = match self.workdir() {
            Ok(workdir) => workdir,
            Err(err) => {
                eprintln!("{}", err);
                return false;
            },
        };

        let output = Command::new("git")
            .arg("am")
            .arg(patch_path.as_ref())
            .current_dir(workdir)
            .output();

        match output {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                eprintln!("{}", String::from_utf8_lossy(&output.stderr).trim_end());
                tracing::debug!(
                    patch = %patch_path.as_ref().display(),
                    exit = ?output.status.code(),
                    "git am rejected the patch"
                );
                false
            },
            Err(err) => {
                eprintln!("could not run git am: {}", err);
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::vcs::git::fixtures::init_repo;

    #[test]
    fn garbage_patch_reports_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Repository::from(init_repo(dir.path()));

        let patch = dir.path().join("broken.patch");
        fs::write(&patch, "this is not a mailbox patch\n").expect("write patch");

        assert!(!repo.apply_patch(&patch));
    }

    #[test]
    fn missing_patch_file_reports_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Repository::from(init_repo(dir.path()));

        assert!(!repo.apply_patch(dir.path().join("does-not-exist.patch")));
    }
}
