#![deny(unused_import_braces, unused_qualifications)]

//! Welcome to `grade-git`!
//!
//! `grade-git` keeps a grading working copy in lock-step with student and
//! team submission repositories. It synchronizes a team's fork into a local
//! tracking branch, makes sure the working tree sits on the exact tag or
//! branch a test should run against, classifies a submission timestamp
//! against a recorded deadline, and hands control to a human operator when
//! automated checkout cannot proceed.
//!
//! A typical grading session (and apologies for the `expect`s):
//!
//! ```no_run
//! use grade_git::git::{Checkout, Repository, SubmissionContext};
//! use grade_git::recovery::ShellIntervention;
//!
//! let repo = Repository::open("./hw3-grading").expect("Failed to open grading repo");
//!
//! // Pull down team42's fork as the local `team42-main` branch.
//! repo.sync_team_main("org/hw3-team42", "team42")
//!     .expect("Failed to sync team42");
//!
//! // Run a test against their handin tag. If the checkout fails, a shell
//! // opens so the grader can untangle the repository by hand.
//! let checkout = Checkout::new(
//!     SubmissionContext {
//!         repo: &repo,
//!         submitter: "team42",
//!     },
//!     ShellIntervention,
//! );
//! let passed = checkout
//!     .run_tag("hw3handin", |_context| {
//!         // ... invoke the actual test here ...
//!         true
//!     })
//!     .expect("Failed to reach hw3handin");
//! assert!(passed);
//! ```

pub mod deadline;
pub mod recovery;
pub mod status;
pub mod vcs;

pub use crate::vcs::git;
