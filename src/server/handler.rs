//! Request validation and dispatch (spec.md §4.6): every check in
//! `validate` runs, in order, before any methylome payload is loaded. Only
//! a fully validated request reaches an aggregation kernel.

use std::sync::Arc;

use log::{debug, warn};

use crate::cache::ResidentCache;
use crate::config::ServerConfig;
use crate::genome_index::GenomeIndex;
use crate::levels::LevelElement;
use crate::methylome::{is_valid_methylome_name, Methylome};
use crate::query::Query;
use crate::server::protocol::{RequestHeader, RequestType, ResponseHeader, ResponseStatus};

pub struct RequestHandler<'a> {
    pub index_cache: &'a ResidentCache<GenomeIndex>,
    pub methylome_cache: &'a ResidentCache<Methylome>,
    pub policy: &'a ServerConfig,
}

/// Everything resolved by validation and needed to run aggregation.
struct Resolved {
    index: Arc<GenomeIndex>,
    methylomes: Vec<Arc<Methylome>>,
    rows: u32,
}

impl<'a> RequestHandler<'a> {
    pub fn new(
        index_cache: &'a ResidentCache<GenomeIndex>,
        methylome_cache: &'a ResidentCache<Methylome>,
        policy: &'a ServerConfig,
    ) -> Self {
        Self { index_cache, methylome_cache, policy }
    }

    /// Run the full validate-then-aggregate pipeline and produce a
    /// response header plus its body. On any validation failure the body
    /// is empty and the header carries the explicit rejection status --
    /// never a partial payload.
    pub fn handle(&self, header: &RequestHeader, body: Option<&[u8]>) -> (ResponseHeader, Vec<u8>) {
        debug!(
            "request: type={:?} aux_value={} methylomes={:?}",
            header.request_type, header.aux_value, header.methylome_names
        );
        let resolved = match self.validate(header) {
            Ok(r) => r,
            Err(status) => {
                warn!("rejecting request: {status:?}");
                return (ResponseHeader::error(status), Vec::new());
            }
        };

        let query = if header.request_type.is_bins() {
            None
        } else {
            match body.and_then(Query::from_bytes) {
                Some(q) => Some(q),
                None => {
                    warn!("rejecting request: malformed query body");
                    return (ResponseHeader::error(ResponseStatus::BadRequest), Vec::new());
                }
            }
        };

        let body = if header.request_type.is_covered() {
            self.aggregate::<crate::levels::LevelsCovered>(header, &resolved, query.as_ref())
        } else {
            self.aggregate::<crate::levels::Levels>(header, &resolved, query.as_ref())
        };

        let cols = resolved.methylomes.len() as u32;
        let header = ResponseHeader::ok(resolved.rows, cols, body.len() as u32);
        debug!("response: rows={} cols={cols} bytes={}", resolved.rows, body.len());
        (header, body)
    }

    fn validate(&self, header: &RequestHeader) -> Result<Resolved, ResponseStatus> {
        // Step 1 (request_type in {intervals, intervals_covered, bins,
        // bins_covered}) is enforced by `RequestType`'s closed variant set
        // at JSON-decode time; a request that doesn't decode never reaches
        // `handle` at all.

        // Step 2: aux_value is type-appropriate.
        if header.request_type.is_bins() {
            if header.aux_value < self.policy.min_bin_size {
                return Err(ResponseStatus::BinSizeTooSmall);
            }
        } else if header.aux_value > self.policy.max_intervals {
            return Err(ResponseStatus::TooManyIntervals);
        }

        // Step 3: syntactic name check, before anything touches disk.
        if header.methylome_names.is_empty()
            || !header.methylome_names.iter().all(|n| is_valid_methylome_name(n))
        {
            return Err(ResponseStatus::InvalidMethylomeName);
        }

        // Step 4: resolve the first methylome, then its declared index.
        let first_name = &header.methylome_names[0];
        let first = self
            .methylome_cache
            .get(first_name)
            .map_err(|_| ResponseStatus::MethylomeNotFound)?;
        let index = self
            .index_cache
            .get(&first.metadata.genome_name)
            .map_err(|_| ResponseStatus::IndexNotFound)?;

        // Step 5: the request's declared index_hash must match the first
        // methylome's.
        if header.index_hash != first.metadata.index_hash {
            return Err(ResponseStatus::InvalidIndexHash);
        }

        // Step 6: every remaining methylome must declare the same
        // index_hash as the first.
        let mut methylomes = Vec::with_capacity(header.methylome_names.len());
        methylomes.push(first);
        for name in &header.methylome_names[1..] {
            let m = self.methylome_cache.get(name).map_err(|_| ResponseStatus::MethylomeNotFound)?;
            if m.metadata.index_hash != header.index_hash {
                return Err(ResponseStatus::InconsistentGenomes);
            }
            methylomes.push(m);
        }

        // Step 7: response shape.
        let rows = if header.request_type.is_bins() {
            index.n_bins(header.aux_value)
        } else {
            header.aux_value
        };

        Ok(Resolved { index, methylomes, rows })
    }

    fn aggregate<L: LevelElement>(&self, header: &RequestHeader, resolved: &Resolved, query: Option<&Query>) -> Vec<u8> {
        let mut out = Vec::with_capacity(resolved.rows as usize * resolved.methylomes.len() * L::N_BYTES);
        for methylome in &resolved.methylomes {
            let column: Vec<L> = if header.request_type.is_bins() {
                methylome.levels_for_bins(header.aux_value, &resolved.index)
            } else {
                methylome.levels_for_query(query.expect("interval request always carries a query body"))
            };
            for elem in column {
                out.extend_from_slice(&elem.to_le_bytes());
            }
        }
        out
    }
}
