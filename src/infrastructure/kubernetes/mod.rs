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

pub mod cache;
pub mod client;
pub mod connection;
pub mod recorder;
pub mod registry;
pub mod resolver;

pub use cache::{Cache, CacheOptions, CacheStrategy, FieldIndexer, IndexFn, InformerCache};
pub use client::{
    ClientOptions, ClientStrategy, ListOptions, ObjectClient, ObjectKey, ObjectReader,
    ObjectWriter, TypedClient, WriteOptions,
};
pub use connection::load_config;
pub use recorder::{
    BroadcasterFactory, Event, EventBroadcaster, EventRecorder, EventSink, EventType,
    RecorderProvider, RecorderProviderStrategy,
};
pub use registry::{ResourceMapping, TypeRegistry};
pub use resolver::{DiscoveryResolver, ResolverStrategy, StaticResolver, TypeResolver};
