// This file is part of grade-git
// <https://github.com/grading-infra/grade-git>
//
// Copyright (C) 2024 Grading Infrastructure Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 or
// later as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Synchronizing a team's submission repository into the grading working
//! copy.
//!
//! Each team is registered as a remote named after the team, its tags and
//! requested branch are fetched, and a local `{team}-{branch}` tracking
//! branch is (re)created from the fetched tip. Every step is idempotent on
//! its own, so a sync can be re-run after a partial failure without
//! leaving stale remotes, tags or branches behind.

use git2::{AutotagOption, Commit, Cred, ErrorCode, FetchOptions, RemoteCallbacks};

use crate::status;
use crate::vcs::git::{error::Error, Presence, Repository};

/// The single hosting provider team repositories live on.
pub const REPO_HOST: &str = "github.com";

/// The SSH clone URL for a team repository id, e.g. `org/hw3-team42`.
pub fn team_repo_url(team_repo_id: &str) -> String {
    format!("git@{}:{}.git", REPO_HOST, team_repo_id)
}

impl Repository {
    /// Synchronize `branch_name` of the team repository `team_repo_id`
    /// into the local tracking branch `{team}-{branch_name}` and check it
    /// out.
    ///
    /// # Errors
    ///
    /// Any git failure that is not an expected "already absent" condition
    /// propagates; see [`Error::Fetch`] and [`Error::MissingRemoteBranch`]
    /// for the interesting cases.
    pub fn sync_team_branch(
        &self,
        team_repo_id: &str,
        team: &str,
        branch_name: &str,
    ) -> Result<(), Error> {
        self.sync_branch_from_url(&team_repo_url(team_repo_id), team, branch_name)
    }

    /// [`Repository::sync_team_branch`] against the team's `main` branch.
    pub fn sync_team_main(&self, team_repo_id: &str, team: &str) -> Result<(), Error> {
        self.sync_team_branch(team_repo_id, team, "main")
    }

    pub(crate) fn sync_branch_from_url(
        &self,
        url: &str,
        team: &str,
        branch_name: &str,
    ) -> Result<(), Error> {
        // Start from the grading skeleton's own branch so the sync always
        // begins in a known state.
        self.checkout_ref(branch_name)?;

        if let Presence::Removed = self.remove_remote(team)? {
            tracing::debug!(remote = team, "removed stale team remote");
        }

        // Submissions must not see tags left over from a previous team's
        // sync.
        self.delete_all_tags()?;

        let mut remote = self.0.remote(team, url)?;

        let tag_spec = "refs/tags/*:refs/tags/*";
        remote
            .fetch(&[tag_spec], Some(&mut fetch_options()), None)
            .map_err(|source| Error::Fetch {
                remote: team.to_owned(),
                spec: tag_spec.to_owned(),
                source,
            })?;

        let branch_spec = format!(
            "+refs/heads/{}:refs/remotes/{}/{}",
            branch_name, team, branch_name
        );
        if let Err(err) = remote.fetch(&[branch_spec.as_str()], Some(&mut fetch_options()), None) {
            // One identical retry; transient ssh hiccups tend to clear.
            tracing::warn!(error = %err, spec = %branch_spec, "branch fetch failed, retrying");
            remote
                .fetch(&[branch_spec.as_str()], Some(&mut fetch_options()), None)
                .map_err(|source| Error::Fetch {
                    remote: team.to_owned(),
                    spec: branch_spec.clone(),
                    source,
                })?;
        }

        let team_branch = format!("{}-{}", team, branch_name);
        if let Presence::Removed = self.delete_local_branch(&team_branch)? {
            tracing::debug!(branch = %team_branch, "removed stale tracking branch");
        }

        let (upstream, tip) = self.remote_branch_tip(team, branch_name)?;
        let mut branch = self.0.branch(&team_branch, &tip, true)?;
        branch.set_upstream(Some(upstream.as_str()))?;

        self.checkout_ref(&team_branch)?;
        status::success(&format!("[ Synchronized {} ]", team_branch));

        Ok(())
    }

    /// Find the fetched tip of `{team}/{branch_name}`. When the requested
    /// branch is `main` and the ref is missing, `{team}/main` is retried
    /// explicitly; some remotes advertise their default branch under a
    /// name that differs from the requested one.
    fn remote_branch_tip(
        &self,
        team: &str,
        branch_name: &str,
    ) -> Result<(String, Commit<'_>), Error> {
        let shorthand = format!("{}/{}", team, branch_name);
        match self.0.find_reference(&format!("refs/remotes/{}", shorthand)) {
            Ok(reference) => Ok((shorthand, reference.peel_to_commit()?)),
            Err(ref err) if err.code() == ErrorCode::NotFound && branch_name == "main" => {
                let fallback = format!("{}/main", team);
                match self.0.find_reference(&format!("refs/remotes/{}", fallback)) {
                    Ok(reference) => Ok((fallback, reference.peel_to_commit()?)),
                    Err(_) => Err(Error::MissingRemoteBranch {
                        remote: team.to_owned(),
                        branch: branch_name.to_owned(),
                    }),
                }
            },
            Err(ref err) if err.code() == ErrorCode::NotFound => {
                Err(Error::MissingRemoteBranch {
                    remote: team.to_owned(),
                    branch: branch_name.to_owned(),
                })
            },
            Err(err) => Err(err.into()),
        }
    }
}

/// Fetch options with ssh-agent credentials for `git@` URLs. Local and
/// anonymous transports never ask for credentials, so the callback only
/// fires when the host does.
fn fetch_options<'a>() -> FetchOptions<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, _allowed_types| {
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"))
    });

    let mut options = FetchOptions::new();
    options
        .remote_callbacks(callbacks)
        .download_tags(AutotagOption::All);
    options
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::vcs::git::fixtures::{branch_at_head, commit_file, init_repo, tag_head};

    struct SyncFixture {
        _upstream_dir: tempfile::TempDir,
        _grading_dir: tempfile::TempDir,
        upstream_url: String,
        grading: Repository,
    }

    fn fixture() -> SyncFixture {
        let upstream_dir = tempfile::tempdir().expect("upstream tempdir");
        let upstream = init_repo(upstream_dir.path());
        commit_file(&upstream, "solution.c", "int main(void) { return 0; }\n", "handin");
        tag_head(&upstream, "hw1handin");
        branch_at_head(&upstream, "dev");

        let grading_dir = tempfile::tempdir().expect("grading tempdir");
        let grading = Repository::from(init_repo(grading_dir.path()));

        let upstream_url = upstream_dir
            .path()
            .to_str()
            .expect("utf-8 tempdir path")
            .to_owned();

        SyncFixture {
            _upstream_dir: upstream_dir,
            _grading_dir: grading_dir,
            upstream_url,
            grading,
        }
    }

    #[test]
    fn sync_materializes_the_tracking_branch_and_tags() {
        let fix = fixture();
        fix.grading
            .sync_branch_from_url(&fix.upstream_url, "team42", "main")
            .expect("sync");

        assert_eq!(
            fix.grading.head_branch_shorthand().expect("HEAD"),
            "team42-main"
        );

        let remote = fix.grading.0.find_remote("team42").expect("remote exists");
        assert_eq!(remote.url(), Some(fix.upstream_url.as_str()));

        let tags = fix.grading.0.tag_names(None).expect("tag names");
        let tags: Vec<_> = tags.iter().flatten().collect();
        assert_eq!(tags, vec!["hw1handin"]);

        // The submission's files are in the working tree.
        let workdir = fix.grading.workdir().expect("workdir");
        assert!(workdir.join("solution.c").exists());
    }

    #[test]
    fn sync_twice_accumulates_nothing() {
        let fix = fixture();
        fix.grading
            .sync_branch_from_url(&fix.upstream_url, "team42", "main")
            .expect("first sync");

        // A tag that only exists locally must not survive the second sync.
        tag_head(&fix.grading.0, "leftover");

        fix.grading
            .sync_branch_from_url(&fix.upstream_url, "team42", "main")
            .expect("second sync");

        let remotes = fix.grading.0.remotes().expect("remotes");
        let remotes: Vec<_> = remotes.iter().flatten().collect();
        assert_eq!(remotes, vec!["team42"]);

        let branches: Vec<_> = fix
            .grading
            .0
            .branches(Some(git2::BranchType::Local))
            .expect("branches")
            .map(|branch| {
                let (branch, _) = branch.expect("branch");
                branch.name().expect("name").expect("utf-8").to_owned()
            })
            .filter(|name| name.starts_with("team42-"))
            .collect();
        assert_eq!(branches, vec!["team42-main"]);

        let tags = fix.grading.0.tag_names(None).expect("tag names");
        let tags: Vec<_> = tags.iter().flatten().collect();
        assert_eq!(tags, vec!["hw1handin"]);
    }

    #[test]
    fn sync_follows_a_named_branch() {
        let fix = fixture();
        // The skeleton carries the base branch the sync starts from.
        branch_at_head(&fix.grading.0, "dev");
        fix.grading
            .sync_branch_from_url(&fix.upstream_url, "team42", "dev")
            .expect("sync dev");

        assert_eq!(
            fix.grading.head_branch_shorthand().expect("HEAD"),
            "team42-dev"
        );
    }

    #[test]
    fn sync_of_a_missing_branch_fails_after_the_retry() {
        let fix = fixture();
        // The skeleton has a `nope` base branch, but the upstream does not.
        branch_at_head(&fix.grading.0, "nope");
        let err = fix
            .grading
            .sync_branch_from_url(&fix.upstream_url, "team42", "nope")
            .expect_err("fetching a missing branch must fail");
        assert!(matches!(
            err,
            Error::Fetch { .. } | Error::MissingRemoteBranch { .. }
        ));
    }

    #[test]
    fn url_template_targets_the_single_host() {
        assert_eq!(
            team_repo_url("org/hw3-team42"),
            "git@github.com:org/hw3-team42.git"
        );
    }
}
