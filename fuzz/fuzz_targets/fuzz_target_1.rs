#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use tokio::runtime::Runtime;
use wshub::buffer::InputChannel;
use wshub::frame;

// Exercises the two places this crate parses attacker-controlled bytes without first
// validating them: the frame header decoder (sync, no I/O) and the HTTP upgrade-request
// parser (async, reads off a channel). Neither should panic on any input.
fuzz_target!(|data: &[u8]| {
    let _ = frame::decode_server_header(data);

    let runtime = Runtime::new().unwrap();
    runtime.block_on(async {
        let mut input = InputChannel::new(Cursor::new(data.to_vec()));
        let _ = wshub::http::parse_upgrade_request(&mut input).await;
    });
});
