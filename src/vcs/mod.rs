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

//! Version-control backends. Only git is supported; the harness assumes a
//! single remote-naming and branch-naming convention on a single host.

pub mod git;
