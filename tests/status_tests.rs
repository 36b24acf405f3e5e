use proptest::prelude::*;

use twicon::core::reader::WordReader;
use twicon::core::status::{BOOTLOADER_SIGNATURE, APP_START_UNSET};
use twicon::infrastructure::terminal::ScriptedConsole;
use twicon::StatusRecord;

/// Property-level checks for the status decoder and the word reader.

fn record(bootloader_start: u16, application_start: u16) -> StatusRecord {
    StatusRecord {
        signature: BOOTLOADER_SIGNATURE,
        version_major: 1,
        version_minor: 6,
        bootloader_start,
        application_start,
        features_code: 0,
        ext_features_code: 0,
        low_fuse_setting: 0x62,
        oscillator_cal: 0x8F,
    }
}

/// Reference rendition of the trampoline formula, written out step by
/// step: byte-swap the application start, mask to the 12-bit
/// relative-jump window, negate two's-complement style, subtract from
/// the word-addressed bootloader start, and scale back to bytes.
fn reference_trampoline(bootloader_start: u16, application_start: u16) -> u16 {
    let h = (application_start >> 8) & 0xFF;
    let l = application_start & 0xFF;
    let msb_first = (l << 8) | h;
    let inverted = ((!msb_first) & 0xFFF).wrapping_add(1);
    (((bootloader_start >> 1).wrapping_sub(inverted)) & 0xFFF) << 1
}

proptest! {
    #[test]
    fn trampoline_matches_reference(bootloader_start: u16, application_start in 0u16..0xFFFF) {
        let record = record(bootloader_start, application_start);
        prop_assert_eq!(
            record.trampoline(),
            Some(reference_trampoline(bootloader_start, application_start))
        );
    }

    #[test]
    fn unset_application_start_never_yields_trampoline(bootloader_start: u16) {
        let record = record(bootloader_start, APP_START_UNSET);
        prop_assert_eq!(record.trampoline(), None);
        prop_assert!(record.render_report(11).contains("Not Set"));
    }

    #[test]
    fn bad_identity_always_classifies_as_application(
        signature: u8,
        version_major: u8,
        version_minor: u8,
    ) {
        let mut rec = record(0x1C00, 0x0100);
        rec.signature = signature;
        rec.version_major = version_major;
        rec.version_minor = version_minor;

        let expected = signature == BOOTLOADER_SIGNATURE
            && (version_major != 0 || version_minor != 0);
        prop_assert_eq!(rec.is_bootloader_identity(), expected);
        if !expected {
            prop_assert!(rec.render_report(8).contains("User application running"));
        }
    }

    #[test]
    fn word_reader_never_overflows(digits in proptest::collection::vec(0u8..10, 0..30)) {
        let mut script: String = digits.iter().map(|d| (b'0' + d) as char).collect();
        script.push('\r');
        let mut console = ScriptedConsole::new(&script);
        let mut reader = WordReader::new();
        while !reader.is_ready() {
            if !reader.poll(&mut console).unwrap() {
                break;
            }
        }
        prop_assert!(reader.is_ready());

        // The clamped buffer keeps the first CAPACITY-1 characters.
        let kept = &script[..digits.len().min(WordReader::CAPACITY - 1)];
        let expected = kept
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(10).wrapping_add((b - b'0') as u64))
            as u16;
        prop_assert_eq!(reader.take(), expected);
    }
}

#[test]
fn trampoline_known_vector() {
    let record = record(0x1C00, 0x0100);
    assert_eq!(record.trampoline(), Some(0x1C02));
    assert_eq!(reference_trampoline(0x1C00, 0x0100), 0x1C02);
}

#[test]
fn status_record_serializes_for_machine_output() {
    let record = record(0x1C00, 0x0100);
    let json = serde_json::to_string(&record).unwrap();
    let back: StatusRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}
