//! Framing and dispatch behavior over the public API

use photonlink_core::protocol::decoders::default_decoder_table;
use photonlink_core::protocol::{
    DecoderRegistry, FrameAssembler, FrameReceiver, ProtocolError, StateFlag, FRAME_LEN,
};
use pretty_assertions::assert_eq;

fn numbered_frames(count: u8) -> Vec<u8> {
    let mut stream = Vec::new();
    for i in 0..count {
        let mut raw = [0u8; FRAME_LEN];
        raw[0] = 0xAA;
        raw[1] = 0x01;
        raw[2] = i;
        raw[12] = i;
        stream.extend_from_slice(&raw);
    }
    stream
}

#[test]
fn any_chunking_of_whole_frames_reassembles_exactly() {
    let stream = numbered_frames(6);

    // Every chunk size from pathological to generous.
    for chunk_size in [1usize, 2, 3, 5, 7, 12, 13, 14, 26, 40] {
        let mut asm = FrameAssembler::new();
        let mut frames = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            asm.feed(chunk);
            while let Some(frame) = asm.try_extract_frame() {
                frames.push(*frame.as_bytes());
            }
        }
        assert_eq!(frames.len(), 6, "chunk size {chunk_size}");
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(
                frame.as_slice(),
                &stream[i * FRAME_LEN..(i + 1) * FRAME_LEN],
                "chunk size {chunk_size}, frame {i}"
            );
        }
        assert!(asm.is_empty());
    }
}

#[test]
fn extractions_never_share_bytes() {
    let stream = numbered_frames(3);
    let mut asm = FrameAssembler::new();
    asm.feed(&stream);

    let mut seen = Vec::new();
    while let Some(frame) = asm.try_extract_frame() {
        seen.push(frame.sub_function_code());
    }
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn documented_decode_scenario() {
    // AA 01 80 00 00 | 00 00 01 2C 00 02 01 02
    let mut receiver =
        FrameReceiver::new(DecoderRegistry::from_table(default_decoder_table()).unwrap());
    receiver.assembler.feed(&[
        0xAA, 0x01, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01, 0x2C, 0x00, 0x02, 0x01, 0x02,
    ]);
    let handled = receiver.dispatch_buffered().unwrap();

    assert_eq!(handled, 1);
    assert_eq!(receiver.state.optical_power, Some(300));
    assert_eq!(receiver.state.mode, Some(0));
    assert_eq!(receiver.state.wavelength_nm, Some(1310));
    assert_eq!(receiver.state.battery_percent, Some(50));
}

#[test]
fn frames_without_a_decoder_leave_state_untouched() {
    let mut receiver =
        FrameReceiver::new(DecoderRegistry::from_table(default_decoder_table()).unwrap());
    let mut raw = [0u8; FRAME_LEN];
    raw[0] = 0xAA;
    raw[1] = 0x6E;
    raw[2] = 0x01;
    receiver.assembler.feed(&raw);

    let handled = receiver.dispatch_buffered().unwrap();
    assert_eq!(handled, 0);
    assert_eq!(receiver.state.optical_power, None);
    assert!(!receiver.state.is_set(StateFlag::PowerData));
    assert!(!receiver.state.is_set(StateFlag::DisplaySettings));
}

#[test]
fn duplicate_decoder_keys_are_a_configuration_error() {
    let mut table = default_decoder_table();
    let dup_key = table[0].0;
    table.push((
        dup_key,
        Box::new(photonlink_core::protocol::decoders::PowerReferenceDecoder),
    ));

    let err = DecoderRegistry::from_table(table).unwrap_err();
    assert!(matches!(err, ProtocolError::DuplicateDecoder { .. }));
}
