//! Native status code taxonomy.
//!
//! Decoding libraries report failures as negative integers. The table below
//! is libopusfile's; the in-process modules reuse its codes so one table
//! describes every backend.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Category of a negative native status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeErrorCategory {
    RequestFailed,
    PageSequenceHole,
    ReadFailed,
    InternalFault,
    NotImplemented,
    InvalidParameter,
    NotFormat,
    BadHeader,
    UnsupportedVersion,
    BadPacket,
    BadLink,
    NotSeekable,
    BadTimestamp,
    Unknown,
}

impl NativeErrorCategory {
    /// Every category with a documented code.
    pub const KNOWN: [NativeErrorCategory; 13] = [
        NativeErrorCategory::RequestFailed,
        NativeErrorCategory::PageSequenceHole,
        NativeErrorCategory::ReadFailed,
        NativeErrorCategory::InternalFault,
        NativeErrorCategory::NotImplemented,
        NativeErrorCategory::InvalidParameter,
        NativeErrorCategory::NotFormat,
        NativeErrorCategory::BadHeader,
        NativeErrorCategory::UnsupportedVersion,
        NativeErrorCategory::BadPacket,
        NativeErrorCategory::BadLink,
        NativeErrorCategory::NotSeekable,
        NativeErrorCategory::BadTimestamp,
    ];

    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::RequestFailed,
            -3 => Self::PageSequenceHole,
            -128 => Self::ReadFailed,
            -129 => Self::InternalFault,
            -130 => Self::NotImplemented,
            -131 => Self::InvalidParameter,
            -132 => Self::NotFormat,
            -133 => Self::BadHeader,
            -134 => Self::UnsupportedVersion,
            -136 => Self::BadPacket,
            -137 => Self::BadLink,
            -138 => Self::NotSeekable,
            -139 => Self::BadTimestamp,
            _ => Self::Unknown,
        }
    }

    /// The documented code, `None` for [`NativeErrorCategory::Unknown`].
    pub fn code(self) -> Option<i32> {
        let code = match self {
            Self::RequestFailed => -1,
            Self::PageSequenceHole => -3,
            Self::ReadFailed => -128,
            Self::InternalFault => -129,
            Self::NotImplemented => -130,
            Self::InvalidParameter => -131,
            Self::NotFormat => -132,
            Self::BadHeader => -133,
            Self::UnsupportedVersion => -134,
            Self::BadPacket => -136,
            Self::BadLink => -137,
            Self::NotSeekable => -138,
            Self::BadTimestamp => -139,
            Self::Unknown => return None,
        };
        Some(code)
    }

    #[rustfmt::skip]
    pub fn description(self) -> &'static str {
        match self {
            Self::RequestFailed => "A request did not succeed.",
            Self::PageSequenceHole => "There was a hole in the page sequence numbers (e.g., a page was corrupt or missing).",
            Self::ReadFailed => "An underlying read, seek, or tell operation failed when it should have succeeded.",
            Self::InternalFault => "A NULL pointer was passed where one was unexpected, or an internal memory allocation failed, or an internal library error was encountered.",
            Self::NotImplemented => "The stream used a feature that is not implemented, such as an unsupported channel family.",
            Self::InvalidParameter => "One or more parameters to a function were invalid.",
            Self::NotFormat => "A purported Ogg Opus stream did not begin with an Ogg page, a purported header packet did not start with one of the required strings, \"OpusHead\" or \"OpusTags\", or a link in a chained file was encountered that did not contain any logical Opus streams.",
            Self::BadHeader => "A required header packet was not properly formatted, contained illegal values, or was missing altogether.",
            Self::UnsupportedVersion => "The ID header contained an unrecognized version number.",
            Self::BadPacket => "An audio packet failed to decode properly. This is usually caused by a multistream Ogg packet where the durations of the individual Opus packets contained in it are not all the same.",
            Self::BadLink => "We failed to find data we had seen before, or the bitstream structure was sufficiently malformed that seeking to the target destination was impossible.",
            Self::NotSeekable => "An operation that requires seeking was requested on an unseekable stream.",
            Self::BadTimestamp => "The first or last granule position of a link failed basic validity checks.",
            Self::Unknown => "Unknown error.",
        }
    }
}

impl fmt::Display for NativeErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A negative status returned by a native decoder function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{library} {code}: {}", .category.description())]
pub struct NativeError {
    library: &'static str,
    code: i32,
    category: NativeErrorCategory,
}

impl NativeError {
    pub fn new(library: &'static str, code: i32) -> Self {
        Self {
            library,
            code,
            category: NativeErrorCategory::from_code(code),
        }
    }

    pub fn library(&self) -> &'static str {
        self.library
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn category(&self) -> NativeErrorCategory {
        self.category
    }
}
