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

use std::time::Duration;

/// Logger names
pub const CLUSTER_LOGGER_NAME: &str = "cluster";
pub const EVENTS_LOGGER_NAME: &str = "events";

/// Cache resync
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(10 * 60 * 60);
pub const RESYNC_JITTER_FACTOR: f64 = 0.1;

/// Events queued per sink; once full, the oldest queued event is dropped.
/// A power of two, which the broadcast channel would otherwise round up to.
pub const EVENT_QUEUE_LENGTH: usize = 1024;

/// Environment variable naming a TOML options file for the CLI
pub const CONFIG_FILE_ENV: &str = "KUBE_CLUSTER_CONFIG_FILE";
