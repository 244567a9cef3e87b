//! Resume/crash-recovery and idempotence properties from `spec.md` §8.

use partfile::{Options, Partfile};

fn opts(dir: &std::path::Path) -> Options {
    Options::default().with_folder(dir).with_part_folder(dir)
}

#[test]
fn truncated_tail_record_is_dropped_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    let container_path = {
        let pf = Partfile::open_new(
            "r1",
            10,
            Some(30),
            opts(dir.path()).with_auto_create(false),
        )
        .unwrap();
        pf.write_first(&[1u8; 10]).unwrap();
        pf.write(1, &[2u8; 10]).unwrap();
        pf.write_last(2, &[3u8; 10]).unwrap();
        pf.container_path().to_path_buf()
    };

    // Chop off the last 5 bytes of the (intact) third record: a truncated
    // tail that must be dropped, not misinterpreted as a corrupt id.
    let len = std::fs::metadata(&container_path).unwrap().len();
    let f = std::fs::OpenOptions::new()
        .write(true)
        .open(&container_path)
        .unwrap();
    f.set_len(len - 5).unwrap();
    drop(f);

    let resumed = Partfile::open_existing(&container_path, false, Options::default()).unwrap();
    assert_eq!(resumed.chunks_written(), 2);
    assert!(!resumed.created());

    let mut buf = [0u8; 10];
    assert_eq!(resumed.read_chunk(0, 0, &mut buf).unwrap(), 10);
    assert_eq!(buf, [1u8; 10]);
    let err = resumed.read_chunk(2, 0, &mut buf).unwrap_err();
    assert!(matches!(err, partfile::Error::MissingChunk { chunk_id: 2 }));
}

#[test]
fn resume_completes_file_when_container_is_whole() {
    let dir = tempfile::tempdir().unwrap();
    let container_path = {
        let pf = Partfile::open_new(
            "r2",
            10,
            Some(20),
            opts(dir.path()).with_auto_create(false),
        )
        .unwrap();
        pf.write_first(&[9u8; 10]).unwrap();
        pf.write_last(1, &[8u8; 10]).unwrap();
        assert!(!pf.created());
        pf.container_path().to_path_buf()
    };

    let resumed =
        Partfile::open_existing(&container_path, false, Options::default().with_auto_create(true))
            .unwrap();
    assert!(resumed.created());
    let completed = std::fs::read(dir.path().join("r2")).unwrap();
    assert_eq!(completed, [vec![9u8; 10], vec![8u8; 10]].concat());
}

#[test]
fn dispose_and_create_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let pf = Partfile::open_new("r3", 4, Some(4), opts(dir.path())).unwrap();
    pf.write_first(&[1, 2, 3, 4]).unwrap();
    assert!(pf.created());
    pf.create().unwrap(); // second call: no-op
    assert!(pf.created());

    pf.dispose().unwrap();
    assert!(pf.disposed());
    pf.dispose().unwrap(); // second call: no-op, no error
    assert!(pf.disposed());
}

#[test]
fn round_trip_before_and_after_create() {
    let dir = tempfile::tempdir().unwrap();
    let container_path;
    {
        let pf = Partfile::open_new(
            "r4",
            8,
            Some(20),
            opts(dir.path()).with_first_chunksize(4).with_auto_create(false),
        )
        .unwrap();
        pf.write_first(&[1u8; 4]).unwrap();
        pf.write(1, &[2u8; 8]).unwrap();
        pf.write_last(2, &[3u8; 8]).unwrap();
        container_path = pf.container_path().to_path_buf();

        let mut buf = vec![0u8; 20];
        assert_eq!(pf.read_at(0, &mut buf).unwrap(), 20);
        assert_eq!(
            buf,
            [vec![1u8; 4], vec![2u8; 8], vec![3u8; 8]].concat()
        );
    }

    // Reopen a fresh partfile from the (not-yet-created) container; reads
    // must yield identical bytes.
    let fresh = Partfile::open_existing(
        &container_path,
        false,
        Options::default().with_auto_create(false),
    )
    .unwrap();
    let mut buf = vec![0u8; 20];
    assert_eq!(fresh.read_at(0, &mut buf).unwrap(), 20);
    assert_eq!(buf, [vec![1u8; 4], vec![2u8; 8], vec![3u8; 8]].concat());
}

#[test]
fn duplicate_write_emits_warning_without_mutating_state() {
    use std::sync::{Arc, Mutex};

    let dir = tempfile::tempdir().unwrap();
    let warnings: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let w = warnings.clone();
    let options = opts(dir.path()).with_on_event(Arc::new(move |event| {
        if let partfile::Event::Warning { message, .. } = event {
            w.lock().unwrap().push(message);
        }
    }));

    let pf = Partfile::open_new("r5", 4, Some(8), options.with_auto_create(false)).unwrap();
    pf.write_first(&[1u8; 4]).unwrap();
    pf.write_first(&[9u8; 4]).unwrap(); // duplicate, non-fatal

    assert_eq!(pf.chunks_written(), 1);
    assert_eq!(warnings.lock().unwrap().len(), 1);

    let mut buf = [0u8; 4];
    assert_eq!(pf.read_chunk(0, 0, &mut buf).unwrap(), 4);
    assert_eq!(buf, [1u8; 4]); // unchanged by the duplicate write
}

