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

//! The checkout interceptor: the state machine that puts the working tree
//! on the right ref before a test runs.
//!
//! Tests are wrapped rather than preceded: the interceptor resolves the
//! grading target, transitions the working tree if it is not already
//! there, and only then invokes the wrapped test body. When the tree is
//! already on the target, nothing is discarded so that edits a grader made
//! by hand survive between tests against the same ref.

use crate::recovery::{InterventionContext, ManualIntervention};
use crate::status;
use crate::vcs::git::{error::Error, Repository};

/// A grading target resolved from its logical name to the concrete ref
/// that is handed to checkout. Computed once per invocation and never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// The name the test asked for: a tag name, a branch name, or `main`.
    pub logical: String,
    /// The ref string that is actually checked out.
    pub concrete: String,
}

impl ResolvedTarget {
    /// Tag-mode resolution. The logical name `main` does not mean the
    /// literal `main` branch: it names the submitter's synchronized
    /// branch, which carries the submitter's identity (see
    /// [`crate::vcs::git::sync`]).
    pub fn tag_mode(tag_name: &str, submitter: &str) -> Self {
        let concrete = if tag_name == "main" {
            submitter.to_owned()
        } else {
            tag_name.to_owned()
        };
        ResolvedTarget {
            logical: tag_name.to_owned(),
            concrete,
        }
    }

    /// Branch-mode resolution: always the submitter's tracking branch
    /// `{submitter}-{branch_name}`.
    pub fn branch_mode(branch_name: &str, submitter: &str) -> Self {
        ResolvedTarget {
            logical: branch_name.to_owned(),
            concrete: format!("{}-{}", submitter, branch_name),
        }
    }
}

/// The submission a test runs against.
pub struct SubmissionContext<'a> {
    /// The grading working copy.
    pub repo: &'a Repository,
    /// The submitter identity, which names the synchronized branch.
    pub submitter: &'a str,
}

/// Wraps test bodies with the checkout state machine.
///
/// A failed checkout does not propagate: the interceptor reports it,
/// blocks on the [`ManualIntervention`] capability, and resumes when the
/// operator is done. The repository state after an intervention is
/// trusted, not re-validated.
pub struct Checkout<'a, I> {
    context: SubmissionContext<'a>,
    intervention: I,
}

impl<'a, I: ManualIntervention> Checkout<'a, I> {
    /// Build an interceptor for one submission.
    pub fn new(context: SubmissionContext<'a>, intervention: I) -> Self {
        Checkout {
            context,
            intervention,
        }
    }

    /// Ensure the working tree is on `tag_name` (or, for the logical name
    /// `main`, on the submitter's synchronized branch), then run `test`.
    ///
    /// The current state is matched against the tag description of `HEAD`;
    /// when it already equals `tag_name` the tree is left untouched apart
    /// from the untracked-file sweep.
    ///
    /// # Errors
    ///
    /// Git failures other than the checkout itself propagate; the checkout
    /// failure path blocks on the operator instead.
    pub fn run_tag<T>(
        &self,
        tag_name: &str,
        test: impl FnOnce(&SubmissionContext<'a>) -> T,
    ) -> Result<T, Error> {
        let target = ResolvedTarget::tag_mode(tag_name, self.context.submitter);
        let current = self.context.repo.describe_head()?;

        if current == target.logical {
            // No discarding: the grader may have made changes to the
            // submission that the next test still needs.
            status::success(&format!("[ Checked out to {} ]\n", target.logical));
        } else {
            let checked_out = if target.logical == "main" {
                format!("{}/main", target.concrete)
            } else {
                target.concrete.clone()
            };
            self.transition(&target, &checked_out, &target.concrete)?;
        }

        self.context.repo.clean_untracked()?;
        Ok(test(&self.context))
    }

    /// Ensure the working tree is on the submitter's `branch_name`
    /// tracking branch, then run `test`.
    ///
    /// The current state is matched against the abbreviated `HEAD` branch
    /// name; the target is always `{submitter}-{branch_name}`.
    ///
    /// # Errors
    ///
    /// As for [`Checkout::run_tag`].
    pub fn run_branch<T>(
        &self,
        branch_name: &str,
        test: impl FnOnce(&SubmissionContext<'a>) -> T,
    ) -> Result<T, Error> {
        let target = ResolvedTarget::branch_mode(branch_name, self.context.submitter);
        let current = self.context.repo.head_branch_shorthand()?;

        if current == target.concrete {
            status::success(&format!("[ Checked out to {} ]\n", target.logical));
        } else {
            self.transition(&target, &target.logical, &target.logical)?;
        }

        self.context.repo.clean_untracked()?;
        Ok(test(&self.context))
    }

    /// Move the working tree onto `target.concrete`: discard uncommitted
    /// changes to tracked files, then check out. On checkout failure,
    /// report and hand the repository to the operator.
    fn transition(
        &self,
        target: &ResolvedTarget,
        checked_out_label: &str,
        failed_label: &str,
    ) -> Result<(), Error> {
        self.context.repo.restore_tracked()?;

        match self.context.repo.checkout_ref(&target.concrete) {
            Ok(()) => {
                status::success(&format!("[ Checked out to {} ]\n", checked_out_label));
                Ok(())
            },
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    refname = %target.concrete,
                    "automated checkout failed, handing over to the operator"
                );
                status::failure(&format!("[ Couldn't checkout to {} ]", failed_label));
                status::advisory("[ Opening shell -- ^D/exit when resolved ]");

                let context = InterventionContext {
                    target: target.concrete.clone(),
                    workdir: self.context.repo.workdir()?.to_path_buf(),
                };
                self.intervention
                    .wait_for_operator(&context)
                    .map_err(Error::Intervention)
            },
        }
    }
}
