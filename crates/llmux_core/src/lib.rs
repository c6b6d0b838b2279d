/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Core abstractions of the llmux gateway: configuration, the request
//! correlation context, the OpenAI-compatible wire schemas, the provider
//! capability set, and the upstream stream-frame decoder.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod openai;
pub mod provider;
pub mod settings;
pub mod stream;
