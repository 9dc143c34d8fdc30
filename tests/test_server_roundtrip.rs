//! End-to-end client/server round trip over a loopback `TcpStream`,
//! exercising the wire protocol (spec.md §4.7) and the request handler
//! (spec.md §4.6) together rather than in isolation.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use transferase::config::ServerConfig;
use transferase::genome_index::{GenomeIndex, GenomeIndexData, GenomeIndexMetadata};
use transferase::levels::{LevelElement, Levels};
use transferase::methylome::{Methylome, MethylomeData, MethylomeMetadata};
use transferase::server::protocol::{RequestHeader, RequestType, ResponseHeader, ResponseStatus};
use transferase::server::Server;

fn toy_index() -> GenomeIndex {
    let mut metadata = GenomeIndexMetadata::new(
        "toy".to_string(),
        vec!["c1".to_string(), "c2".to_string()],
        vec![8, 4],
    );
    metadata.n_cpgs = 4;
    metadata.chrom_offset = vec![0, 2];
    let data = GenomeIndexData { positions: vec![vec![2, 6], vec![0, 2]] };
    metadata.index_hash = data.hash();
    GenomeIndex::new(metadata, data)
}

fn write_fixture(dir: &Path, methylome_name: &str) -> u64 {
    let index = toy_index();
    index.write(dir, "toy").unwrap();

    let data = MethylomeData { counts: vec![(1, 0), (0, 1), (2, 2), (0, 0)] };
    let mut meta =
        MethylomeMetadata::new(index.metadata.genome_name.clone(), 4, index.metadata.index_hash, false);
    meta.methylome_hash = data.hash();
    let methylome = Methylome::new(meta, data);
    methylome.write(dir, methylome_name, false).unwrap();

    index.metadata.index_hash
}

fn spawn_server(dir: &Path, port: u16) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
    let config = ServerConfig {
        data_dir: dir.to_path_buf(),
        port,
        n_threads: 2,
        max_intervals: 10,
        min_bin_size: 1,
        ..Default::default()
    };
    let server = Server::new(config);
    let shutdown = server.shutdown_handle();
    std::thread::spawn(move || {
        server.run().unwrap();
    });
    std::thread::sleep(Duration::from_millis(200));
    shutdown
}

fn send_request(port: u16, header: &RequestHeader, body: Option<&[u8]>) -> (ResponseHeader, Vec<u8>) {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let json = header.to_json().unwrap();
    stream.write_u32::<LittleEndian>(json.len() as u32).unwrap();
    stream.write_all(&json).unwrap();
    if let Some(body) = body {
        stream.write_all(body).unwrap();
    }
    let resp = ResponseHeader::read_from(&mut stream).unwrap();
    let mut payload = vec![0u8; resp.n_bytes as usize];
    stream.read_exact(&mut payload).unwrap();
    (resp, payload)
}

#[test]
fn bins_request_round_trips_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let index_hash = write_fixture(dir.path(), "sample1");
    let port = 15_901;
    let shutdown = spawn_server(dir.path(), port);

    let header = RequestHeader {
        request_type: RequestType::Bins,
        index_hash,
        aux_value: 4,
        methylome_names: vec!["sample1".to_string()],
    };
    let (resp, body) = send_request(port, &header, None);

    assert_eq!(resp.status, ResponseStatus::Ok);
    assert_eq!(resp.rows, 3);
    assert_eq!(resp.cols, 1);
    assert_eq!(body.len(), 3 * 8);
    let expected = [Levels { n_meth: 1, n_unmeth: 0 }, Levels { n_meth: 0, n_unmeth: 1 }, Levels { n_meth: 2, n_unmeth: 2 }];
    for (i, lv) in expected.iter().enumerate() {
        assert_eq!(&body[i * 8..i * 8 + 8], lv.to_le_bytes().as_slice());
    }

    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
}

#[test]
fn intervals_request_round_trips_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let index_hash = write_fixture(dir.path(), "sample2");
    let port = 15_902;
    let shutdown = spawn_server(dir.path(), port);

    let header = RequestHeader {
        request_type: RequestType::Intervals,
        index_hash,
        aux_value: 2,
        methylome_names: vec!["sample2".to_string()],
    };
    let index = toy_index();
    let ivs = [
        transferase::interval::GenomicInterval::new(0, 0, 8),
        transferase::interval::GenomicInterval::new(1, 0, 4),
    ];
    let query = index.make_query(&ivs);
    let (resp, body) = send_request(port, &header, Some(&query.to_bytes()));

    assert_eq!(resp.status, ResponseStatus::Ok);
    assert_eq!(resp.rows, 2);
    let expected = [Levels { n_meth: 1, n_unmeth: 1 }, Levels { n_meth: 2, n_unmeth: 2 }];
    for (i, lv) in expected.iter().enumerate() {
        assert_eq!(&body[i * 8..i * 8 + 8], lv.to_le_bytes().as_slice());
    }

    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
}

#[test]
fn too_many_intervals_is_rejected_with_empty_body() {
    let dir = tempfile::tempdir().unwrap();
    let index_hash = write_fixture(dir.path(), "sample3");
    let port = 15_903;
    let shutdown = spawn_server(dir.path(), port);

    let header = RequestHeader {
        request_type: RequestType::Intervals,
        index_hash,
        aux_value: 99, // > max_intervals (10)
        methylome_names: vec!["sample3".to_string()],
    };
    let (resp, body) = send_request(port, &header, Some(&[]));

    assert_eq!(resp.status, ResponseStatus::TooManyIntervals);
    assert_eq!(resp.rows, 0);
    assert_eq!(resp.cols, 0);
    assert_eq!(resp.n_bytes, 0);
    assert!(body.is_empty());

    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
}

#[test]
fn unknown_methylome_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "sample4");
    let port = 15_904;
    let shutdown = spawn_server(dir.path(), port);

    let header = RequestHeader {
        request_type: RequestType::Bins,
        index_hash: 0,
        aux_value: 4,
        methylome_names: vec!["does_not_exist".to_string()],
    };
    let (resp, _body) = send_request(port, &header, None);
    assert_eq!(resp.status, ResponseStatus::MethylomeNotFound);

    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
}
