//! TCP acceptor and fixed worker pool. One acceptor thread reads
//! connections off a `TcpListener` and hands them to a bounded
//! `crossbeam_channel` queue; a fixed number of worker threads pull from
//! that queue and run the read/handle/write state machine per connection.
//! Backpressure is the channel itself: once every worker is busy and the
//! queue is full, `accept` blocks rather than spawning unbounded tasks.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::cache::ResidentCache;
use crate::config::ServerConfig;
use crate::genome_index::GenomeIndex;
use crate::methylome::Methylome;
use crate::server::handler::RequestHandler;
use crate::server::protocol::{RequestHeader, ResponseHeader, ResponseStatus};

pub struct Server {
    config: ServerConfig,
    index_cache: Arc<ResidentCache<GenomeIndex>>,
    methylome_cache: Arc<ResidentCache<Methylome>>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let data_dir = config.data_dir.clone();
        let index_dir = data_dir.clone();
        let index_cache = Arc::new(ResidentCache::new(index_dir, config.max_resident_indexes, |dir, name| {
            GenomeIndex::read(dir, name)
        }));
        let methylome_dir = data_dir;
        let methylome_cache = Arc::new(ResidentCache::new(methylome_dir, config.max_resident_methylomes, |dir, name| {
            Methylome::read(dir, name)
        }));
        Self { config, index_cache, methylome_cache, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    /// A handle the caller can use to request a graceful shutdown from
    /// another thread (e.g. a signal handler installed by `xfr`).
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))?;
        info!("listening on port {}", self.config.port);

        let (sender, receiver): (Sender<TcpStream>, Receiver<TcpStream>) = bounded(self.config.accept_queue_depth);

        let mut workers = Vec::with_capacity(self.config.n_threads);
        for worker_id in 0..self.config.n_threads {
            let receiver = receiver.clone();
            let index_cache = self.index_cache.clone();
            let methylome_cache = self.methylome_cache.clone();
            let config = self.config.clone();
            workers.push(thread::spawn(move || {
                worker_loop(worker_id, receiver, index_cache, methylome_cache, config);
            }));
        }

        listener.set_nonblocking(true)?;
        while !self.shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    if sender.send(stream).is_err() {
                        break; // all workers gone
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(std::time::Duration::from_millis(20));
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                }
            }
        }
        info!("shutdown requested, draining in-flight connections");
        drop(sender);
        join_with_grace_period(workers, self.config.shutdown_grace_period);
        Ok(())
    }
}

/// Wait for every worker to drain its queue, but no longer than `grace`.
/// A per-connection read/handle/write timeout already bounds how long any
/// single worker can be stuck, so this is a backstop: past the grace
/// period we stop waiting and let the process exit, which reclaims the
/// still-running threads with it.
fn join_with_grace_period(workers: Vec<thread::JoinHandle<()>>, grace: std::time::Duration) {
    let (done_tx, done_rx) = bounded::<()>(1);
    let waiter = thread::spawn(move || {
        for w in workers {
            let _ = w.join();
        }
        let _ = done_tx.send(());
    });
    if done_rx.recv_timeout(grace).is_err() {
        warn!("shutdown grace period elapsed with workers still draining");
    }
    drop(waiter);
}

fn worker_loop(
    worker_id: usize,
    receiver: Receiver<TcpStream>,
    index_cache: Arc<ResidentCache<GenomeIndex>>,
    methylome_cache: Arc<ResidentCache<Methylome>>,
    config: ServerConfig,
) {
    debug!("worker {worker_id} started");
    for stream in receiver.iter() {
        if let Err(e) = serve_connection(stream, &index_cache, &methylome_cache, &config) {
            debug!("worker {worker_id}: connection ended with error: {e}");
        }
    }
    debug!("worker {worker_id} exiting");
}

/// `reading_header -> reading_body? -> handling -> writing_header ->
/// writing_body -> closing` (spec.md §4.8), with independent timeouts on
/// the read and write phases.
fn serve_connection(
    mut stream: TcpStream,
    index_cache: &ResidentCache<GenomeIndex>,
    methylome_cache: &ResidentCache<Methylome>,
    config: &ServerConfig,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(config.read_timeout))?;
    stream.set_write_timeout(Some(config.write_timeout))?;

    let header = match read_request_header(&mut stream) {
        Ok(h) => h,
        Err(crate::error::Error::ConnectionTimeout) => {
            debug!("connection timed out reading the request header, closing");
            return Ok(());
        }
        Err(_) => {
            let resp = ResponseHeader::error(ResponseStatus::BadRequest);
            let mut buf = Vec::new();
            resp.write_to(&mut buf)?;
            stream.write_all(&buf)?;
            return Ok(());
        }
    };

    // Reject an over-large `aux_value` before it ever sizes an allocation:
    // an interval request declares its body length as `aux_value * 8`
    // bytes, so an unvalidated `aux_value` up to `u32::MAX` would force a
    // multi-gigabyte read buffer ahead of any policy check.
    if !header.request_type.is_bins() && header.aux_value > config.max_intervals {
        let resp = ResponseHeader::error(ResponseStatus::TooManyIntervals);
        let mut buf = Vec::new();
        resp.write_to(&mut buf)?;
        stream.write_all(&buf)?;
        return Ok(());
    }

    let body = if !header.request_type.is_bins() {
        match read_query_body(&mut stream, header.aux_value as usize, config.max_intervals as usize) {
            Ok(b) => Some(b),
            Err(crate::error::Error::ConnectionTimeout) => {
                debug!("connection timed out reading the query body, closing");
                return Ok(());
            }
            Err(_) => {
                let resp = ResponseHeader::error(ResponseStatus::BadRequest);
                let mut buf = Vec::new();
                resp.write_to(&mut buf)?;
                stream.write_all(&buf)?;
                return Ok(());
            }
        }
    } else {
        None
    };

    let handler = RequestHandler::new(index_cache, methylome_cache, config);
    let started = Instant::now();
    let (resp_header, resp_body) = handler.handle(&header, body.as_deref());
    if started.elapsed() > config.handle_timeout {
        warn!("handling took longer than the configured handle timeout, closing without a response");
        return Ok(());
    }

    let mut out = Vec::with_capacity(16 + resp_body.len());
    resp_header.write_to(&mut out)?;
    out.extend_from_slice(&resp_body);
    stream.write_all(&out)?;
    Ok(())
}

/// Request frames are length-prefixed JSON: a little-endian `u32` byte
/// count followed by that many bytes of UTF-8 JSON (§4.7 describes the
/// header's logical shape; the length prefix is the framing needed to know
/// where one ends on a byte stream).
fn read_request_header(stream: &mut TcpStream) -> crate::error::Result<RequestHeader> {
    use byteorder::{LittleEndian, ReadBytesExt};
    let len = stream.read_u32::<LittleEndian>().map_err(|e| map_read_error("<request>", e))? as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).map_err(|e| map_read_error("<request>", e))?;
    RequestHeader::from_json(&buf)
}

/// `n_intervals` has already been checked against `max_intervals` by the
/// caller; `max_intervals` is taken again here as a hard cap so this
/// function never allocates past policy even if that check is ever
/// skipped or reordered above it.
fn read_query_body(stream: &mut TcpStream, n_intervals: usize, max_intervals: usize) -> crate::error::Result<Vec<u8>> {
    if n_intervals > max_intervals {
        return Err(crate::error::Error::TooManyIntervals { requested: n_intervals as u32, max: max_intervals as u32 });
    }
    let mut buf = vec![0u8; n_intervals * 8];
    stream.read_exact(&mut buf).map_err(|e| map_read_error("<query body>", e))?;
    Ok(buf)
}

/// A read past its deadline surfaces as `WouldBlock`/`TimedOut` depending on
/// platform; fold both into the one `connection_timeout` error kind rather
/// than the generic `Io` kind the rest of this crate uses for I/O failures.
fn map_read_error(path: &'static str, source: std::io::Error) -> crate::error::Error {
    match source.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => crate::error::Error::ConnectionTimeout,
        _ => crate::error::Error::io(path, source),
    }
}
