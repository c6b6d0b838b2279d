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

//! Request-scoped correlation context.
//!
//! Every request is tagged with an opaque correlation ID, either taken from
//! the incoming `X-Request-Id` header (any casing) or freshly generated. The
//! ID lives in a task-local so upstream clients and log records can read it
//! without threading it through every call. Streaming response bodies outlive
//! the handler scope, so they capture the ID by value at construction time.

use std::future::Future;

use uuid::Uuid;

/// Canonical casing of the correlation header.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Lower-case form of the correlation header; HTTP header lookup is
/// case-insensitive, so either spelling on the wire resolves to this.
pub const REQUEST_ID_HEADER_LOWER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Generate a fresh opaque correlation token.
pub fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Run `future` with `id` installed as the current correlation ID.
pub fn scope<F>(id: String, future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    REQUEST_ID.scope(id, future)
}

/// The correlation ID of the current request, if one is in scope.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_outside_scope() {
        assert_eq!(current_request_id(), None);
    }

    #[tokio::test]
    async fn visible_inside_scope() {
        let id = new_request_id();
        let seen = scope(id.clone(), async { current_request_id() }).await;
        assert_eq!(seen, Some(id));
    }

    #[tokio::test]
    async fn inner_scope_shadows_outer() {
        let seen = scope("outer".to_string(), async {
            scope("inner".to_string(), async { current_request_id() }).await
        })
        .await;
        assert_eq!(seen.as_deref(), Some("inner"));
    }

    #[test]
    fn generated_ids_are_opaque_and_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
