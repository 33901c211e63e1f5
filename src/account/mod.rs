//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Addrbook.
//
// Addrbook is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Addrbook is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Addrbook. If not, see <http://www.gnu.org/licenses/>.

//! Mail account registration and mailbox provisioning.

pub mod notify;
pub mod provision;
pub mod registration;
