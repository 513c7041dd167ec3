use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use bpk::error::Error;
use bpk::types::{BPK_TYPE_KER, BPK_TYPE_PBL, BPK_TYPE_PBLV, BPK_TYPE_RFS};
use bpk::Bpk;

const SZ_1K: usize = 1024;
const SZ_512: usize = 512;

fn write_data(dir: &Path, len: usize) -> PathBuf {
    let path = dir.join("data.bin");
    fs::write(&path, vec![0u8; len]).unwrap();
    path
}

/// Creates a package with five 2 KiB partitions, one of them hardware
/// tagged and one with a caller-defined type.
fn create_package(file: &Path, data: &Path) {
    let mut pkg = Bpk::create(file).unwrap();
    pkg.write_file(BPK_TYPE_PBL, 0, data).unwrap();
    pkg.write_file(BPK_TYPE_PBLV, 0xFFFFFFFF, data).unwrap();
    pkg.write_file(BPK_TYPE_KER, 0, data).unwrap();
    pkg.write_file(BPK_TYPE_RFS, 0, data).unwrap();
    pkg.write_file(42, 0, data).unwrap();
    pkg.close().unwrap();
}

#[test]
fn empty_create() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("empty.bpk");

    let pkg = Bpk::create(&file).unwrap();
    pkg.close().unwrap();

    let bytes = fs::read(&file).unwrap();
    assert_eq!(
        bytes,
        [
            0x53, 0x4F, 0x46, 0x59, // SOFY
            0x00, 0x01, 0x00, 0x00, // version 1.0
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1C, // size = 28
            0x62, 0x0A, 0x2D, 0x0E, // crc over the header with this field zeroed
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // spare
        ]
    );

    let mut pkg = Bpk::open(&file, false).unwrap();
    assert!(pkg.check_crc().unwrap());
    pkg.close().unwrap();
}

#[test]
fn create_and_reopen() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), 2 * SZ_1K);

    create_package(&file, &data);

    let mut pkg = Bpk::open(&file, false).unwrap();
    assert!(pkg.check_crc().unwrap());
    pkg.close().unwrap();
}

#[test]
fn read_partitions() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), 2 * SZ_1K);

    create_package(&file, &data);

    let mut pkg = Bpk::open(&file, false).unwrap();
    pkg.find(BPK_TYPE_PBL, 0).unwrap();
    let out = dir.path().join("extracted.bin");
    pkg.read_to_file(&out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&data).unwrap());

    // read_to_file cleared the cursor, so next moves to the second record
    let part = pkg.next().unwrap();
    assert_eq!(part.part_type, BPK_TYPE_PBLV);
    assert_eq!(part.hw_id, 0xFFFFFFFF);
    assert_eq!(part.size, (2 * SZ_1K) as u64);

    // reads clamp to the partition boundary and never cross it
    let mut buf = vec![0u8; SZ_1K];
    assert_eq!(pkg.read(&mut buf).unwrap(), SZ_1K);
    assert_eq!(pkg.read(&mut buf[..SZ_512]).unwrap(), SZ_512);
    assert_eq!(pkg.read(&mut buf).unwrap(), SZ_512);
    assert_eq!(pkg.read(&mut buf).unwrap(), 0);

    pkg.close().unwrap();
}

#[test]
fn find_matches_type_and_hw_id() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), 2 * SZ_1K);

    create_package(&file, &data);

    let mut pkg = Bpk::open(&file, false).unwrap();
    pkg.find(BPK_TYPE_PBL, 0).unwrap();
    pkg.find(BPK_TYPE_RFS, 0).unwrap();
    pkg.find(BPK_TYPE_PBL, 0).unwrap();

    // written with hw_id 0xFFFFFFFF, so hw_id 0 must not match
    assert!(matches!(pkg.find(BPK_TYPE_PBLV, 0), Err(Error::NotFound)));
    pkg.find(BPK_TYPE_PBLV, 0xFFFFFFFF).unwrap();
    pkg.close().unwrap();
}

#[test]
fn find_miss_leaves_handle_usable() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), SZ_1K);

    let mut pkg = Bpk::create(&file).unwrap();
    pkg.write_file(BPK_TYPE_PBL, 0, &data).unwrap();
    pkg.write_file(BPK_TYPE_PBLV, 0, &data).unwrap();
    pkg.write_file(BPK_TYPE_RFS, 0, &data).unwrap();
    pkg.close().unwrap();

    let mut pkg = Bpk::open(&file, false).unwrap();
    assert!(matches!(pkg.find(BPK_TYPE_KER, 0), Err(Error::NotFound)));
    pkg.rewind().unwrap();
    pkg.find(BPK_TYPE_PBL, 0).unwrap();
    pkg.close().unwrap();
}

#[test]
fn corruption_is_detected() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), 2 * SZ_1K);

    let mut pkg = Bpk::create(&file).unwrap();
    pkg.write_file(BPK_TYPE_PBL, 0, &data).unwrap();
    pkg.close().unwrap();

    let mut pkg = Bpk::open(&file, false).unwrap();
    assert!(pkg.check_crc().unwrap());
    pkg.close().unwrap();

    // clobber the first partition record header, behind the library's back
    let mut fd = OpenOptions::new().write(true).open(&file).unwrap();
    fd.seek(SeekFrom::Start(28)).unwrap();
    fd.write_all(b"test").unwrap();
    drop(fd);

    let mut pkg = Bpk::open(&file, false).unwrap();
    assert!(!pkg.check_crc().unwrap());
    pkg.close().unwrap();
}

#[test]
fn append_mode() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), 2 * SZ_1K);

    let mut pkg = Bpk::create(&file).unwrap();
    pkg.write_file(BPK_TYPE_PBL, 0, &data).unwrap();
    pkg.write_file(BPK_TYPE_PBLV, 0, &data).unwrap();
    pkg.close().unwrap();

    let mut pkg = Bpk::open(&file, true).unwrap();
    pkg.write_file(BPK_TYPE_RFS, 0, &data).unwrap();
    pkg.close().unwrap();

    let mut pkg = Bpk::open(&file, true).unwrap();
    assert!(pkg.check_crc().unwrap());
    pkg.find(BPK_TYPE_RFS, 0).unwrap();
    pkg.close().unwrap();
}

#[test]
fn trailing_garbage_is_ignored() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), 2 * SZ_1K);

    create_package(&file, &data);

    // junk appended after close must not affect verification or iteration
    let mut fd = OpenOptions::new().append(true).open(&file).unwrap();
    for _ in 0..1000 {
        fd.write_all(b"test").unwrap();
    }
    drop(fd);

    let mut pkg = Bpk::open(&file, false).unwrap();
    assert!(pkg.check_crc().unwrap());

    let mut count = 0;
    while pkg.next().is_some() {
        count += 1;
    }
    assert_eq!(count, 5);
    pkg.close().unwrap();
}

#[test]
fn zero_length_partition() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");

    let mut pkg = Bpk::create(&file).unwrap();
    pkg.write_from(42, 7, &mut std::io::empty()).unwrap();
    pkg.close().unwrap();

    let mut pkg = Bpk::open(&file, false).unwrap();
    assert!(pkg.check_crc().unwrap());

    let part = pkg.next().unwrap();
    assert_eq!(part.part_type, 42);
    assert_eq!(part.hw_id, 7);
    assert_eq!(part.size, 0);

    let mut buf = [0u8; 16];
    assert_eq!(pkg.read(&mut buf).unwrap(), 0);
    assert!(pkg.next().is_none());
    pkg.close().unwrap();
}

#[test]
fn roundtrip_is_byte_identical() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");

    // larger than one working buffer, and not a multiple of it
    let payload: Vec<u8> = (0..2048 + 512).map(|i| (i * 7 % 256) as u8).collect();
    let input = dir.path().join("payload.bin");
    fs::write(&input, &payload).unwrap();

    let mut pkg = Bpk::create(&file).unwrap();
    pkg.write_file(BPK_TYPE_KER, 3, &input).unwrap();
    pkg.close().unwrap();

    let mut pkg = Bpk::open(&file, false).unwrap();
    pkg.find(BPK_TYPE_KER, 3).unwrap();
    let out = dir.path().join("payload.out");
    pkg.read_to_file(&out).unwrap();
    pkg.close().unwrap();

    assert_eq!(fs::read(&out).unwrap(), payload);
}

#[test]
fn reopen_preserves_bytes() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("test.bpk");
    let data = write_data(dir.path(), SZ_1K);

    create_package(&file, &data);
    let before = fs::read(&file).unwrap();

    let pkg = Bpk::open(&file, false).unwrap();
    pkg.close().unwrap();
    assert_eq!(fs::read(&file).unwrap(), before);

    // a writable reopen re-patches the header with identical values
    let pkg = Bpk::open(&file, true).unwrap();
    pkg.close().unwrap();
    assert_eq!(fs::read(&file).unwrap(), before);
}

#[test]
fn open_rejects_foreign_files() {
    let dir = tempdir().unwrap();

    let file = dir.path().join("short.bin");
    fs::write(&file, b"SOFY").unwrap();
    assert!(matches!(
        Bpk::open(&file, false),
        Err(Error::Malformed(_))
    ));

    let file = dir.path().join("garbage.bin");
    fs::write(&file, vec![0xAAu8; 64]).unwrap();
    assert!(matches!(
        Bpk::open(&file, false),
        Err(Error::Malformed(_))
    ));
}
