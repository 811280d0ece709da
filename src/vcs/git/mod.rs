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

//! Git plumbing for the grading working copy.
//!
//! The [`Repository`] wrapper exposes exactly the operations the harness
//! needs: synchronizing a team's fork ([`mod@sync`]), moving the working
//! tree onto a grading target ([`mod@checkout`]) and applying handin
//! patches ([`mod@patch`]). Everything mutates the single working tree in
//! place; callers are expected to run strictly sequentially.

pub mod checkout;
pub mod error;
pub mod patch;
pub mod sync;

pub use checkout::{Checkout, ResolvedTarget, SubmissionContext};
pub use error::Error;
pub use sync::team_repo_url;

use std::fs;
use std::io;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{BranchType, DescribeOptions, ErrorCode, ObjectType, Status, StatusOptions};

/// Outcome of removing something that may already be gone.
///
/// Idempotent setup steps (removing a stale remote, force-deleting a
/// tracking branch) check for the target before removing it, rather than
/// swallowing a generic failure after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The target existed and has been removed.
    Removed,
    /// There was nothing to remove.
    AlreadyAbsent,
}

/// Wrapper around the `git2`'s `git2::Repository` type.
/// This is to limit the functionality that we can do
/// on the underlying object.
pub struct Repository(pub(crate) git2::Repository);

impl Repository {
    /// Open the grading working copy at `path`.
    ///
    /// # Errors
    ///
    /// * [`Error::Git`]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        git2::Repository::open(path.as_ref())
            .map(Repository)
            .map_err(Error::from)
    }

    /// The working directory of the repository.
    ///
    /// # Errors
    ///
    /// * [`Error::NoWorkingTree`] for bare repositories.
    pub fn workdir(&self) -> Result<&Path, Error> {
        self.0.workdir().ok_or(Error::NoWorkingTree)
    }

    /// Describe the current `HEAD`: the name of a tag pointing at it, or
    /// the abbreviated commit id when no tag matches (the `--always`
    /// fallback).
    pub fn describe_head(&self) -> Result<String, Error> {
        let mut options = DescribeOptions::new();
        options.describe_tags().show_commit_oid_as_fallback(true);
        let description = self.0.describe(&options)?.format(None)?;
        Ok(description)
    }

    /// The abbreviated name of the branch `HEAD` points at, e.g. `main`
    /// or `team42-dev`.
    pub fn head_branch_shorthand(&self) -> Result<String, Error> {
        let head = self.0.head()?;
        head.shorthand()
            .map(str::to_owned)
            .ok_or(Error::Utf8 { context: "HEAD" })
    }

    /// Force-checkout `target`, which may be a branch name, a tag name or
    /// anything else `git rev-parse` accepts. Branches become the new
    /// `HEAD`; other targets leave `HEAD` detached at the peeled commit.
    ///
    /// # Errors
    ///
    /// * [`Error::Checkout`]
    pub fn checkout_ref(&self, target: &str) -> Result<(), Error> {
        self.try_checkout(target).map_err(|source| Error::Checkout {
            target: target.to_owned(),
            source,
        })
    }

    fn try_checkout(&self, target: &str) -> Result<(), git2::Error> {
        let (object, reference) = self.0.revparse_ext(target)?;

        let mut builder = CheckoutBuilder::new();
        builder.force();
        self.0.checkout_tree(&object, Some(&mut builder))?;

        match reference {
            Some(ref gitref) if gitref.is_branch() => {
                let name = gitref
                    .name()
                    .ok_or_else(|| git2::Error::from_str("branch name is not valid UTF-8"))?;
                self.0.set_head(name)
            },
            _ => {
                let commit = object.peel(ObjectType::Commit)?;
                self.0.set_head_detached(commit.id())
            },
        }
    }

    /// Restore every tracked file to its `HEAD` state, discarding
    /// uncommitted modifications. Untracked files are left alone.
    pub fn restore_tracked(&self) -> Result<(), Error> {
        let mut builder = CheckoutBuilder::new();
        builder.force();
        self.0.checkout_head(Some(&mut builder))?;
        Ok(())
    }

    /// Remove untracked files and directories from the working tree.
    /// Tracked files, modified or not, are untouched; ignored files stay.
    pub fn clean_untracked(&self) -> Result<(), Error> {
        let workdir = self.workdir()?.to_path_buf();

        let mut options = StatusOptions::new();
        options.include_untracked(true).include_ignored(false);
        let statuses = self.0.statuses(Some(&mut options))?;

        for entry in statuses.iter() {
            if !entry.status().contains(Status::WT_NEW) {
                continue;
            }
            let path = entry.path().ok_or(Error::Utf8 {
                context: "untracked path",
            })?;
            let full = workdir.join(path);

            let removed = if full.is_dir() {
                fs::remove_dir_all(&full)
            } else {
                fs::remove_file(&full)
            };
            match removed {
                Ok(()) => tracing::debug!(path = %full.display(), "removed untracked path"),
                // A parent directory listed earlier may have taken this
                // entry with it.
                Err(ref err) if err.kind() == io::ErrorKind::NotFound => {},
                Err(source) => return Err(Error::Clean { path: full, source }),
            }
        }

        Ok(())
    }

    /// Remove the remote named `name` if it exists.
    pub(crate) fn remove_remote(&self, name: &str) -> Result<Presence, Error> {
        match self.0.find_remote(name) {
            Ok(_) => {
                self.0.remote_delete(name)?;
                Ok(Presence::Removed)
            },
            Err(ref err) if err.code() == ErrorCode::NotFound => Ok(Presence::AlreadyAbsent),
            Err(err) => Err(err.into()),
        }
    }

    /// Force-delete the local branch named `name` if it exists.
    pub(crate) fn delete_local_branch(&self, name: &str) -> Result<Presence, Error> {
        match self.0.find_branch(name, BranchType::Local) {
            Ok(mut branch) => {
                branch.delete()?;
                Ok(Presence::Removed)
            },
            Err(ref err) if err.code() == ErrorCode::NotFound => Ok(Presence::AlreadyAbsent),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete every tag reference in the repository.
    pub(crate) fn delete_all_tags(&self) -> Result<(), Error> {
        let names = self.0.tag_names(None)?;
        for name in names.iter() {
            let name = name.ok_or(Error::Utf8 { context: "tag" })?;
            self.0.tag_delete(name)?;
        }
        Ok(())
    }
}

impl From<git2::Repository> for Repository {
    fn from(repo: git2::Repository) -> Self {
        Repository(repo)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ".git")
    }
}
