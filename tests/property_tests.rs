//! Property-based tests for the update controller

mod common;

use common::*;
use nrf52840_ota_firmware::core::protocol::Command;
use nrf52840_ota_firmware::core::status::{Status, StatusRecord};
use nrf52840_ota_firmware::ota::crc32;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Start(u32),
    Data(Vec<u8>),
    Verify(Option<u32>),
    Flash,
    Reset,
    Abort,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => (0..TEST_CAPACITY + 256).prop_map(Step::Start),
        5 => prop::collection::vec(any::<u8>(), 0..300).prop_map(Step::Data),
        1 => proptest::option::of(any::<u32>()).prop_map(Step::Verify),
        1 => Just(Step::Flash),
        1 => Just(Step::Reset),
        1 => Just(Step::Abort),
    ]
}

/// Image plus the chunk sizes it is split into
fn image_and_chunks() -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    prop::collection::vec(any::<u8>(), 1..2048).prop_flat_map(|image| {
        let len = image.len();
        // Intermediate chunks stay word sized; the last one takes the remainder
        let chunks = prop::collection::vec(1usize..=61, 1..64)
            .prop_map(move |words| split(len, words.iter().map(|w| w * 4)));
        (Just(image), chunks)
    })
}

fn split(len: usize, sizes: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut chunks = Vec::new();
    let mut left = len;
    for size in sizes {
        if size >= left {
            break;
        }
        chunks.push(size);
        left -= size;
    }
    chunks.push(left);
    chunks
}

proptest! {
    #[test]
    fn test_any_chunking_stages_the_image((image, chunks) in image_and_chunks()) {
        let mut h = harness();
        run(h.controller.execute(Command::Start { size: image.len() as u32 })).unwrap();

        let mut offset = 0;
        for (i, len) in chunks.iter().enumerate() {
            prop_assert_eq!(h.controller.session().status(), Status::Receiving);
            run(h.controller.handle_data(&image[offset..offset + len])).unwrap();
            offset += len;
            prop_assert_eq!(h.controller.session().received_bytes(), offset as u32);
            prop_assert_eq!(i + 1 == chunks.len(), h.controller.session().status() == Status::Received);
        }

        prop_assert_eq!(h.flash.staged(0, image.len()), image.clone());
        let padded = (4 - image.len() % 4) % 4;
        prop_assert_eq!(h.flash.staged(image.len() as u32, padded), vec![0xFF; padded]);

        run(h.controller.execute(Command::Verify { expected_crc: Some(crc32(&image)) })).unwrap();
        prop_assert_eq!(h.controller.session().status(), Status::Verified);
    }

    #[test]
    fn test_session_stays_consistent(steps in prop::collection::vec(step(), 1..40)) {
        let mut h = harness();

        for step in steps {
            let before = h.sink.count();
            let _ = match step {
                Step::Start(size) => run(h.controller.execute(Command::Start { size })),
                Step::Data(chunk) => run(h.controller.handle_data(&chunk)),
                Step::Verify(expected_crc) => run(h.controller.execute(Command::Verify { expected_crc })),
                Step::Flash => run(h.controller.execute(Command::Flash)),
                Step::Reset => run(h.controller.execute(Command::Reset)),
                Step::Abort => run(h.controller.execute(Command::Abort)),
            };

            let session = h.controller.session();
            prop_assert!(session.is_consistent(), "{:?}", session);
            prop_assert!(session.expected_size() <= TEST_CAPACITY);
            prop_assert_eq!(h.sink.count(), before + 1);
            prop_assert_eq!(h.sink.last(), Some(session.record()));
            prop_assert_eq!(h.controller.status_record(), session.record());
        }
    }

    #[test]
    fn test_unknown_control_bytes_change_nothing(
        code in 0x07u8..=0xFF,
        params in prop::collection::vec(any::<u8>(), 0..7),
    ) {
        let mut h = harness();
        run(h.controller.execute(Command::Start { size: 64 })).unwrap();
        let before = h.controller.status_record();

        let mut write = vec![code];
        write.extend_from_slice(&params);
        prop_assert!(run(h.controller.handle_control(&write)).is_err());

        prop_assert_eq!(h.controller.status_record(), before);
        prop_assert_eq!(h.sink.count(), 1);
        prop_assert_ne!(before, StatusRecord::IDLE);
    }
}
