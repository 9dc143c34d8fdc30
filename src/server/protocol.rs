//! Wire types: the JSON request header, the binary query body that follows
//! it for interval requests, and the fixed-width binary response header.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// One of the four supported aggregation kinds, carried in the request
/// header as a lowercase string and matched against this set during
/// validation (spec.md §4.6 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Intervals,
    IntervalsCovered,
    Bins,
    BinsCovered,
}

impl RequestType {
    pub fn is_covered(&self) -> bool {
        matches!(self, RequestType::IntervalsCovered | RequestType::BinsCovered)
    }

    pub fn is_bins(&self) -> bool {
        matches!(self, RequestType::Bins | RequestType::BinsCovered)
    }
}

/// JSON-encoded request header. `aux_value` is `n_intervals` for interval
/// requests or `bin_size` for bin requests; which one it means is implied
/// by `request_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHeader {
    pub request_type: RequestType,
    pub index_hash: u64,
    pub aux_value: u32,
    pub methylome_names: Vec<String>,
}

impl RequestHeader {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::json("<request header>", e))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::json("<request header>", e))
    }
}

/// Stable, integer-valued status codes reported in every response header.
/// Discriminants are part of the wire contract and must never be
/// renumbered.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok = 0,
    InvalidRequestType = 1,
    TooManyIntervals = 2,
    BinSizeTooSmall = 3,
    InvalidMethylomeName = 4,
    MethylomeNotFound = 5,
    IndexNotFound = 6,
    InvalidIndexHash = 7,
    InconsistentGenomes = 8,
    BadRequest = 9,
}

impl ResponseStatus {
    pub fn from_u32(v: u32) -> Option<Self> {
        use ResponseStatus::*;
        Some(match v {
            0 => Ok,
            1 => InvalidRequestType,
            2 => TooManyIntervals,
            3 => BinSizeTooSmall,
            4 => InvalidMethylomeName,
            5 => MethylomeNotFound,
            6 => IndexNotFound,
            7 => InvalidIndexHash,
            8 => InconsistentGenomes,
            9 => BadRequest,
            _ => return None,
        })
    }
}

pub const RESPONSE_HEADER_BYTES: usize = 16;

/// Fixed 16-byte response header: `status`, `rows`, `cols`, `n_bytes`, each
/// a little-endian `u32`. If `status != Ok` the body is empty and
/// `rows == cols == n_bytes == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: ResponseStatus,
    pub rows: u32,
    pub cols: u32,
    pub n_bytes: u32,
}

impl ResponseHeader {
    pub fn error(status: ResponseStatus) -> Self {
        Self { status, rows: 0, cols: 0, n_bytes: 0 }
    }

    pub fn ok(rows: u32, cols: u32, n_bytes: u32) -> Self {
        Self { status: ResponseStatus::Ok, rows, cols, n_bytes }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.status as u32)
            .and_then(|_| w.write_u32::<LittleEndian>(self.rows))
            .and_then(|_| w.write_u32::<LittleEndian>(self.cols))
            .and_then(|_| w.write_u32::<LittleEndian>(self.n_bytes))
            .map_err(|e| Error::io("<response header>", e))
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let status_raw = r.read_u32::<LittleEndian>().map_err(|e| Error::io("<response header>", e))?;
        let rows = r.read_u32::<LittleEndian>().map_err(|e| Error::io("<response header>", e))?;
        let cols = r.read_u32::<LittleEndian>().map_err(|e| Error::io("<response header>", e))?;
        let n_bytes = r.read_u32::<LittleEndian>().map_err(|e| Error::io("<response header>", e))?;
        let status = ResponseStatus::from_u32(status_raw).ok_or(Error::MalformedHeader)?;
        Ok(Self { status, rows, cols, n_bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_header_round_trips_through_json() {
        let header = RequestHeader {
            request_type: RequestType::Bins,
            index_hash: 0xdead_beef,
            aux_value: 500,
            methylome_names: vec!["a".to_string(), "b".to_string()],
        };
        let bytes = header.to_json().unwrap();
        let back = RequestHeader::from_json(&bytes).unwrap();
        assert_eq!(back.index_hash, header.index_hash);
        assert_eq!(back.aux_value, 500);
        assert_eq!(back.methylome_names, vec!["a", "b"]);
        assert!(matches!(back.request_type, RequestType::Bins));
    }

    #[test]
    fn response_header_round_trips_through_bytes() {
        let header = ResponseHeader::ok(3, 2, 48);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), RESPONSE_HEADER_BYTES);
        let back = ResponseHeader::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn error_header_has_zeroed_shape() {
        let header = ResponseHeader::error(ResponseStatus::TooManyIntervals);
        assert_eq!(header.rows, 0);
        assert_eq!(header.cols, 0);
        assert_eq!(header.n_bytes, 0);
    }
}
