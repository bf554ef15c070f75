/*
 * This file is part of Quadromon.
 *
 * Copyright (C) 2025 Quadromon contributors
 *
 * Quadromon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Quadromon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Quadromon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Quadromon - Aquacomputer Quadro telemetry
//!
//! Command-line frontend. Live values come from quadromond; the decoding
//! and channel table live in `qm-core`.

pub mod cli;
