// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque identifiers used throughout the crate. All are thin wrappers over a `String` supplied
//! by the host application (the PKI issuance service assigns user identities; folder and file
//! identifiers are whatever the server middleware's namespace uses).
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }
    };
}

opaque_id!(UserId);
opaque_id!(FolderId);
opaque_id!(FileId);
