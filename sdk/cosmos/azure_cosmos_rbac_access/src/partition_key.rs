// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::fmt;

use crate::AuthMode;

/// A single string partition key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn value(&self) -> &str {
        &self.0
    }

    pub(crate) fn to_sdk(&self) -> azure_data_cosmos::PartitionKey {
        azure_data_cosmos::PartitionKey::from(self.0.clone())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&String> for PartitionKey {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl From<AuthMode> for PartitionKey {
    fn from(mode: AuthMode) -> Self {
        Self(mode.as_str().to_string())
    }
}
