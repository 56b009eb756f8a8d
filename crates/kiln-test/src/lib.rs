//! # Kiln Test
//!
//! In-memory testing for Kiln applications. Requests go through the full
//! pipeline (hooks, middleware, routing and error handling) without a
//! transport.
//!
//! ## Example
//!
//! ```
//! use kiln_core::{HandlerError, Request, Response};
//! use kiln_kernel::{Kernel, LifecycleManager};
//! use kiln_middleware::MiddlewareManager;
//! use kiln_router::Router;
//! use kiln_test::TestClient;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let kernel = Kernel::new(Arc::new(LifecycleManager::new()), Arc::new(MiddlewareManager::new()));
//! let mut router = Router::new();
//! router
//!     .get("/users/{id}", |request: Request| async move {
//!         let id = request.path_param("id").unwrap_or_default().to_string();
//!         Ok::<_, HandlerError>(serde_json::json!({ "id": id }))
//!     })
//!     .unwrap();
//! kernel.register_router(Arc::new(router));
//!
//! let client = TestClient::from_kernel(Arc::new(kernel));
//! let response = client.get("/users/123").send().await;
//!
//! response.assert_status_code(200);
//! assert_eq!(response.json_value().unwrap()["id"], "123");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use response::TestResponse;
