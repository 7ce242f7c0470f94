// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod registry;
pub mod schema;
pub mod tool;

pub use registry::{RegistryError, ToolRegistry, ToolSchema};
pub use schema::{Field, Schema, ValidationError};
pub use tool::{Capability, Observation, Tool, ToolCall};
