// Copyright 2025 Fleet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Fleet CLI
//!
//! Command-line interface for the fleet controller.
//!
//! - `fleet controller`: run the controller (admin API, proxy, background loops)
//! - `fleet scale`, `fleet add-node`, `fleet status`: talk to a running
//!   controller through [`admin::AdminClient`] and print raw JSON

pub mod admin;
