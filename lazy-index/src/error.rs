// Copyright 2026 The lazy-index Authors.
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

//! Error types shared by every structure in the crate.

use std::io;

use thiserror::Error;

/// The broad class an [`Error`] belongs to.
///
/// Argument errors are raised before any state is touched. Runtime errors
/// describe a structure or collaborator in an unexpected state. I/O errors
/// come from the medium unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Runtime,
    Io,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} out of bounds")]
    OutOfBounds(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("missing {0}")]
    Missing(String),

    #[error("{0} already set")]
    AlreadySet(String),

    #[error("cache slot {slot} holds no matching value after read")]
    CacheMiss { slot: usize },

    #[error("node {0} does not belong to this tree")]
    ForeignNode(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_)
            | Error::OutOfBounds(_)
            | Error::Unsupported(_)
            | Error::Config(_) => ErrorKind::Argument,
            Error::Missing(_)
            | Error::AlreadySet(_)
            | Error::CacheMiss { .. }
            | Error::ForeignNode(_) => ErrorKind::Runtime,
            Error::Io(_) | Error::ShortRead { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Error {
        Error::InvalidArgument(what.into())
    }

    pub(crate) fn out_of_bounds(what: impl Into<String>) -> Error {
        Error::OutOfBounds(what.into())
    }

    pub(crate) fn missing(what: impl Into<String>) -> Error {
        Error::Missing(what.into())
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::ShortRead { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string()),
            other => match other.kind() {
                ErrorKind::Argument => io::Error::new(io::ErrorKind::InvalidInput, other.to_string()),
                _ => io::Error::new(io::ErrorKind::Other, other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::invalid("offset").kind(), ErrorKind::Argument);
        assert_eq!(Error::out_of_bounds("element index 4").kind(), ErrorKind::Argument);
        assert_eq!(Error::missing("sub node 2").kind(), ErrorKind::Runtime);
        assert_eq!(Error::CacheMiss { slot: 3 }.kind(), ErrorKind::Runtime);
        assert_eq!(Error::ShortRead { expected: 4, actual: 1 }.kind(), ErrorKind::Io);
    }

    #[test]
    fn converts_into_io_error() {
        let e: io::Error = Error::ShortRead { expected: 8, actual: 2 }.into();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);

        let e: io::Error = Error::invalid("whence").into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);

        let inner = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let e: io::Error = Error::from(inner).into();
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(Error::out_of_bounds("value offset 35").to_string(), "value offset 35 out of bounds");
        assert_eq!(
            Error::CacheMiss { slot: 7 }.to_string(),
            "cache slot 7 holds no matching value after read"
        );
    }
}
