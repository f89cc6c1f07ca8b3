// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the `Cgka` and `ServerMiddleware` traits, plus the deterministic RNG
//! constructor used throughout this crate's own tests. Gated behind the `test_utils` feature so
//! host applications can reuse them in their own integration tests without pulling in a real MLS
//! stack.
mod in_memory_persister;
mod in_memory_server;
mod mock_cgka;

pub use in_memory_persister::InMemoryStatePersister;
pub use in_memory_server::InMemoryServer;
pub use mock_cgka::MockCgka;
