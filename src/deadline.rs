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

//! Deadline parsing and lateness classification.
//!
//! A deadline is recorded as a single line of text,
//! `MM/DD/YY HH:MM AM|PM`, interpreted in America/New_York with the
//! seconds forced to `:59` of the stated minute. The file is read fresh on
//! every check and an empty file means "no deadline recorded".

use std::{fmt, fs, io, path::Path};

use chrono::{DateTime, FixedOffset, LocalResult, Months, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

use crate::status;

/// The fixed format of the recorded deadline line, e.g. `12/05/23 11:59 PM`.
const DEADLINE_FORMAT: &str = "%m/%d/%y %I:%M %p";

/// Enumeration of errors that can occur while checking a deadline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The deadline file could not be read.
    #[error("could not read the deadline file")]
    Io(#[from] io::Error),
    /// The deadline line does not match [`DEADLINE_FORMAT`].
    #[error("could not parse deadline `{line}`")]
    Parse {
        /// The offending first line of the deadline file.
        line: String,
        /// The underlying `chrono` parse failure.
        #[source]
        source: chrono::ParseError,
    },
    /// The stated wall-clock time does not exist in America/New_York,
    /// i.e. it falls inside a daylight-saving gap.
    #[error("deadline `{0}` does not exist in America/New_York")]
    Localize(NaiveDateTime),
}

/// How far past the deadline a submission landed.
///
/// The breakdown is calendar-aware in the `relativedelta` sense: whole
/// calendar months are stripped off first, and the remainder is broken
/// into days, hours, minutes and seconds. Months do not show up in the
/// rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lateness {
    /// Whole days late, after whole calendar months are stripped.
    pub days: i64,
    /// Whole hours late, 0..24.
    pub hours: i64,
    /// Whole minutes late, 0..60.
    pub minutes: i64,
    /// Whole seconds late, 0..60.
    pub seconds: i64,
}

impl Lateness {
    /// Break down the distance from `deadline` to the later `submission`.
    pub fn between(deadline: DateTime<Tz>, submission: DateTime<Tz>) -> Self {
        // Strip whole calendar months first so that, e.g., a submission in
        // March measured against a January deadline reports the days past
        // the month boundary rather than sixty-odd days.
        let mut anchor = deadline;
        loop {
            match anchor.checked_add_months(Months::new(1)) {
                Some(next) if next <= submission => anchor = next,
                _ => break,
            }
        }

        let rest = submission.signed_duration_since(anchor);
        Lateness {
            days: rest.num_days(),
            hours: rest.num_hours() % 24,
            minutes: rest.num_minutes() % 60,
            seconds: rest.num_seconds() % 60,
        }
    }
}

impl fmt::Display for Lateness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days, {} hrs, {} mins, and {} secs",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Check whether `submission` landed past the deadline recorded at
/// `deadline_path`.
///
/// Returns `Ok(false)` for an on-time submission or when no deadline is
/// recorded, and `Ok(true)` for a late one. The comparison is inclusive:
/// a submission at the exact deadline second is on time. Either way a
/// status line is printed for the grader; nothing else is mutated.
///
/// # Errors
///
/// * [`Error::Io`] if the deadline file cannot be read.
/// * [`Error::Parse`] if the recorded line is malformed.
/// * [`Error::Localize`] if the stated time falls in a daylight-saving
///   gap.
pub fn check_late(
    deadline_path: impl AsRef<Path>,
    submission: DateTime<FixedOffset>,
) -> Result<bool, Error> {
    let deadline = match read_deadline(deadline_path.as_ref())? {
        Some(deadline) => deadline,
        None => return Ok(false),
    };

    let submission = submission.with_timezone(&New_York);
    if submission <= deadline {
        status::success("[ SUBMISSION ON TIME ]");
        return Ok(false);
    }

    let late_by = Lateness::between(deadline, submission);
    status::failure(&late_report(&late_by));

    Ok(true)
}

/// The red status line for a late submission.
fn late_report(late_by: &Lateness) -> String {
    format!("[SUBMISSION LATE]: Submitted {} late", late_by)
}

/// Read and parse the recorded deadline, or `None` when the file is empty.
fn read_deadline(path: &Path) -> Result<Option<DateTime<Tz>>, Error> {
    let contents = fs::read_to_string(path)?;
    let line = contents.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let naive = NaiveDateTime::parse_from_str(line, DEADLINE_FORMAT).map_err(|source| {
        Error::Parse {
            line: line.to_owned(),
            source,
        }
    })?;
    let naive = naive.with_second(59).expect("59 is a valid second");

    match New_York.from_local_datetime(&naive) {
        LocalResult::Single(deadline) => Ok(Some(deadline)),
        // The fall-back transition states the wall-clock time twice; take
        // the earlier reading.
        LocalResult::Ambiguous(earliest, _) => Ok(Some(earliest)),
        LocalResult::None => Err(Error::Localize(naive)),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn deadline_file(dir: &tempfile::TempDir, line: &str) -> std::path::PathBuf {
        let path = dir.path().join("deadline.txt");
        let mut file = fs::File::create(&path).expect("create deadline file");
        writeln!(file, "{}", line).expect("write deadline file");
        path
    }

    fn iso(timestamp: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(timestamp).expect("valid RFC 3339 timestamp")
    }

    #[test]
    fn on_time_at_the_deadline_second() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = deadline_file(&dir, "01/01/24 11:59 PM");

        let late = check_late(&path, iso("2024-01-01T23:59:59-05:00")).expect("check");
        assert!(!late);
    }

    #[test]
    fn late_shortly_after_the_deadline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = deadline_file(&dir, "01/01/24 11:59 PM");

        let late = check_late(&path, iso("2024-01-02T00:00:30-05:00")).expect("check");
        assert!(late);
    }

    #[test]
    fn late_by_a_single_second() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = deadline_file(&dir, "01/01/24 11:59 PM");

        let late = check_late(&path, iso("2024-01-02T00:00:00-05:00")).expect("check");
        assert!(late);

        let deadline = New_York
            .with_ymd_and_hms(2024, 1, 1, 23, 59, 59)
            .single()
            .expect("unambiguous deadline");
        let late_by = Lateness::between(
            deadline,
            iso("2024-01-02T00:00:00-05:00").with_timezone(&New_York),
        );
        assert_eq!(
            late_by,
            Lateness {
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: 1,
            }
        );
    }

    #[test]
    fn late_report_spells_the_status_line() {
        let late_by = Lateness {
            days: 0,
            hours: 0,
            minutes: 1,
            seconds: 31,
        };
        assert_eq!(
            late_report(&late_by),
            "[SUBMISSION LATE]: Submitted 0 days, 0 hrs, 1 mins, and 31 secs late"
        );
    }

    #[test]
    fn empty_deadline_file_is_never_late() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deadline.txt");
        fs::File::create(&path).expect("create empty deadline file");

        let late = check_late(&path, iso("2099-12-31T23:59:59-05:00")).expect("check");
        assert!(!late);
    }

    #[test]
    fn malformed_deadline_propagates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = deadline_file(&dir, "first of January, midnight-ish");

        let err = check_late(&path, iso("2024-01-01T00:00:00-05:00"))
            .expect_err("malformed deadline must not be recovered");
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn lateness_breakdown_counts_minutes_and_seconds() {
        let deadline = New_York
            .with_ymd_and_hms(2024, 1, 1, 23, 59, 59)
            .single()
            .expect("unambiguous deadline");
        let submission = New_York
            .with_ymd_and_hms(2024, 1, 2, 0, 1, 30)
            .single()
            .expect("unambiguous submission");

        let late_by = Lateness::between(deadline, submission);
        assert_eq!(
            late_by,
            Lateness {
                days: 0,
                hours: 0,
                minutes: 1,
                seconds: 31,
            }
        );
        assert_eq!(late_by.to_string(), "0 days, 0 hrs, 1 mins, and 31 secs");
    }

    #[test]
    fn lateness_breakdown_strips_whole_months() {
        let deadline = New_York
            .with_ymd_and_hms(2024, 1, 1, 23, 59, 59)
            .single()
            .expect("unambiguous deadline");
        let submission = New_York
            .with_ymd_and_hms(2024, 3, 5, 23, 59, 59)
            .single()
            .expect("unambiguous submission");

        // Two whole months removed; a flat-duration breakdown would report
        // 64 days instead.
        let late_by = Lateness::between(deadline, submission);
        assert_eq!(late_by.days, 4);
        assert_eq!(late_by.hours, 0);
    }

    proptest! {
        #[test]
        fn classification_matches_the_sign_of_the_offset(offset in -1_000_000i64..=1_000_000) {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = deadline_file(&dir, "01/01/24 11:59 PM");

            let deadline = New_York
                .with_ymd_and_hms(2024, 1, 1, 23, 59, 59)
                .single()
                .expect("unambiguous deadline");
            let submission = (deadline + Duration::seconds(offset)).fixed_offset();

            let late = check_late(&path, submission).expect("check");
            prop_assert_eq!(late, offset > 0);

            if offset > 0 {
                let late_by = Lateness::between(deadline, submission.with_timezone(&New_York));
                let total = ((late_by.days * 24 + late_by.hours) * 60 + late_by.minutes) * 60
                    + late_by.seconds;
                prop_assert!(total > 0);
            }
        }
    }
}
