// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod types;

pub use types::*;
