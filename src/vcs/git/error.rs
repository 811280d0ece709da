//! Collection of errors that can occur when performing operations from
//! [`crate::vcs::git`].

use std::io;
use std::path::PathBuf;

/// Enumeration of errors that can occur when synchronizing and checking
/// out submission repositories.
///
/// "Nothing to remove" conditions (a remote, tag or branch that is already
/// absent) are deliberately not errors; those removals report a
/// [`crate::vcs::git::Presence`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A wrapper around the generic [`git2::Error`].
    #[error(transparent)]
    Git(#[from] git2::Error),
    /// Fetching from a team remote failed, even after the repeated
    /// attempt for the branch fetch.
    #[error("could not fetch `{spec}` from remote `{remote}`")]
    Fetch {
        /// The remote (i.e. team) name the fetch was issued against.
        remote: String,
        /// The refspec that failed to fetch.
        spec: String,
        /// The underlying git failure.
        #[source]
        source: git2::Error,
    },
    /// The target ref could not be checked out. Inside the checkout
    /// interceptor this is converted into a manual intervention rather
    /// than propagated.
    #[error("could not checkout `{target}`")]
    Checkout {
        /// The concrete ref that was handed to checkout.
        target: String,
        /// The underlying git failure.
        #[source]
        source: git2::Error,
    },
    /// After a successful fetch the expected remote-tracking branch is
    /// still missing, even after falling back to the remote's `main`.
    #[error("remote `{remote}` has no branch `{branch}`")]
    MissingRemoteBranch {
        /// The remote (i.e. team) name.
        remote: String,
        /// The branch that was requested.
        branch: String,
    },
    /// A ref or path name handed back by git was not valid UTF-8.
    #[error("the {context} name is not valid UTF-8")]
    Utf8 {
        /// Which name failed to parse.
        context: &'static str,
    },
    /// An untracked file could not be removed while cleaning the working
    /// tree.
    #[error("could not remove `{}` from the working tree", path.display())]
    Clean {
        /// The path that resisted removal.
        path: PathBuf,
        /// The underlying filesystem failure.
        #[source]
        source: io::Error,
    },
    /// The repository has no working directory to operate on.
    #[error("the repository is bare and has no working tree")]
    NoWorkingTree,
    /// The manual-recovery hand-off itself could not be performed.
    #[error("could not hand control to the operator")]
    Intervention(#[source] io::Error),
}
