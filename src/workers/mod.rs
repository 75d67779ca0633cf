// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod extract_worker;
pub mod fetch_worker;
pub mod flush_worker;
pub mod manager;
