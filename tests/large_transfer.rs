//! A transfer larger than `DEFAULT_PIPE_BUFF_THRESH` forces the self-looped
//! pipe through at least one stall-and-drain cycle, and a 100000-byte
//! `DEFAULT_BUFFER_SIZE` scratch buffer against a socket send/recv pair all
//! but guarantees short reads and writes along the way. None of that
//! should be visible from the outside: every byte sent must come back, in
//! order, exactly once.

mod util;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use xps_core::DEFAULT_PIPE_BUFF_THRESH;

#[test]
fn large_transfer_through_backpressured_pipe_is_byte_exact() {
    let mut core = xps_core::Core::new().expect("create core");
    let listener = core.bind(util::local_loopback()).expect("bind listener");
    let addr = core.listener_addr(listener).expect("listener address");
    util::spawn_core(core);

    let total = DEFAULT_PIPE_BUFF_THRESH * 2 + 12_345;
    let pattern: Vec<u8> = (0..total).map(|i| (i % 256) as u8).collect();

    let mut writer = TcpStream::connect(addr).expect("connect");
    writer.set_write_timeout(Some(Duration::from_secs(15))).unwrap();
    let mut reader = writer.try_clone().expect("clone stream for independent reader");
    reader.set_read_timeout(Some(Duration::from_secs(15))).unwrap();

    let expected = pattern.clone();
    let writer_thread = thread::spawn(move || {
        writer.write_all(&pattern).expect("write full pattern");
    });

    let mut received = vec![0u8; total];
    reader.read_exact(&mut received).expect("read full echo back");
    writer_thread.join().expect("writer thread panicked");

    assert!(received == expected, "echoed bytes must match the sent pattern exactly despite back-pressure and short reads/writes");
}
