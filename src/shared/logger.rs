// Copyright 2025 JiangLong.
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

use std::fmt::Display;
use tracing::Span;

/// A named diagnostic destination. Records go through `tracing` with the name
/// attached as the `logger` field; child loggers join names with `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: String,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: format!("{}.{}", self.name, name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("component", logger = %self.name)
    }

    pub fn info(&self, message: &str) {
        tracing::info!(logger = %self.name, "{}", message);
    }

    pub fn error(&self, err: &dyn Display, message: &str) {
        tracing::error!(logger = %self.name, error = %err, "{}", message);
    }
}
