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

//! The manual-intervention capability.
//!
//! When an automated checkout cannot reach its target (merge conflicts,
//! missing refs, a half-finished rebase) the harness suspends itself and
//! waits for a human. The capability is a trait so tests can stand in a
//! double for the real interactive shell.

use std::io;
use std::path::PathBuf;
use std::process::Command;

/// What the operator is dropped into the repository to fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterventionContext {
    /// The ref the automated checkout failed to reach.
    pub target: String,
    /// The working directory of the repository under grading.
    pub workdir: PathBuf,
}

/// A blocking hand-off to a human operator.
///
/// Implementations must not return until the operator signals that they
/// are done; the caller trusts the repository state afterwards and does
/// not re-validate it.
pub trait ManualIntervention {
    /// Block the calling thread until the operator signals resolution.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] only when the hand-off itself could not be
    /// performed, not when the operator leaves the repository broken.
    fn wait_for_operator(&self, context: &InterventionContext) -> io::Result<()>;
}

/// Opens an interactive `bash` in the repository's working directory and
/// blocks until the operator exits it (`^D`/`exit`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellIntervention;

impl ManualIntervention for ShellIntervention {
    fn wait_for_operator(&self, context: &InterventionContext) -> io::Result<()> {
        let status = Command::new("bash").current_dir(&context.workdir).status()?;
        tracing::debug!(
            refname = %context.target,
            exit = ?status.code(),
            "operator closed the recovery shell"
        );
        Ok(())
    }
}
