// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod cell;
pub mod content_type;
pub mod locate;
pub mod pipeline;
pub mod table;
pub mod triples;
