//! Controller, metadata and update session behavior against the simulated flash

use alloc::vec::Vec;

use ::crc::{Crc, CRC_32_ISO_HDLC};
use fwflash_core::crc::{compute_crc32, HardwareCrc32, SoftCrcUnit, SoftwareCrc32};
use fwflash_core::error::{ConfigFault, FlashFault, HardwareFault, VerifyFailure};
use fwflash_core::flash::{FlashController, MAX_SECTORS};
use fwflash_core::layout::{
    FirmwareImageRequest, FlashMap, ImageKind, SectorInfo, SectorState, APPLICATION_START,
    BOOTLOADER_START, ERASED_WORD, METADATA_SECTOR,
};
use fwflash_core::metadata::{
    BootloaderVersionRecord, ImageValidity, IntegrityRecord, MetadataReader, MetadataStore,
    VersionField,
};
use fwflash_core::planner;
use fwflash_core::port::FlashStatus;
use fwflash_core::session::{SessionState, UpdateSession};

use crate::SimFlash;

const REFERENCE: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

fn controller() -> FlashController<SimFlash> {
    FlashController::new(SimFlash::new_default(), FlashMap::STM32F4)
}

fn ready() -> FlashController<SimFlash> {
    let mut flash = controller();
    flash.initialize().unwrap();
    flash
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

fn put_word(flash: &mut FlashController<SimFlash>, addr: u32, value: u32) {
    let offset = (addr - flash.map().base) as usize;
    flash.port_mut().data_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn install(flash: &mut FlashController<SimFlash>, kind: ImageKind, image: &[u8]) -> u32 {
    let request = FirmwareImageRequest::new(kind, image.len() as u32);
    let mut session = UpdateSession::new(flash, request);
    session.start().unwrap();
    for chunk in image.chunks(1000) {
        let addr = session.next_address();
        session.write(addr, chunk).into_result().unwrap();
    }
    session.finish(&mut SoftwareCrc32::new(), None).unwrap().crc32
}

fn validity(flash: &FlashController<SimFlash>) -> ImageValidity {
    MetadataReader::new(flash).validate_application(&mut SoftwareCrc32::new())
}

// Flash controller

#[test]
fn test_initialize_is_idempotent() {
    let mut flash = controller();
    assert!(!flash.is_initialized());
    flash.initialize().unwrap();
    flash.initialize().unwrap();
    assert!(flash.is_initialized());
    assert_eq!(flash.port().unlock_calls(), 1);
}

#[test]
fn test_controller_over_borrowed_port() {
    let mut sim = SimFlash::new_default();
    {
        let mut flash = FlashController::new(&mut sim, FlashMap::STM32F4);
        flash.initialize().unwrap();
        flash.erase_region(ImageKind::Bootloader, 4).unwrap();
        flash
            .write_verified(BOOTLOADER_START, b"boot")
            .into_result()
            .unwrap();
    }
    assert_eq!(sim.slice(BOOTLOADER_START, 4).unwrap(), b"boot");
    assert_eq!(sim.erase_log(), &[0]);
}

#[test]
fn test_initialize_reports_stuck_lock() {
    let mut flash = controller();
    flash.port_mut().refuse_unlock();
    assert_eq!(
        flash.initialize(),
        Err(FlashFault::Hardware(HardwareFault::Locked))
    );
    assert!(!flash.is_initialized());
}

#[test]
fn test_initialize_refuses_oversized_map() {
    static MANY: [SectorInfo; MAX_SECTORS + 1] =
        [SectorInfo::new(0, 0x0800_0000, 0x8000); MAX_SECTORS + 1];
    let map = FlashMap {
        sectors: &MANY,
        ..FlashMap::STM32F4
    };
    let mut flash = FlashController::new(SimFlash::new_default(), map);

    assert_eq!(
        flash.initialize(),
        Err(FlashFault::Config(ConfigFault::InvalidMap))
    );
    assert!(!flash.is_initialized());
    assert_eq!(flash.port().unlock_calls(), 0);
    assert_eq!(
        flash.erase_region(ImageKind::Application, 16),
        Err(FlashFault::Hardware(HardwareFault::Locked))
    );
    assert!(flash.port().erase_log().is_empty());
}

#[test]
fn test_erase_requires_initialize() {
    let mut flash = controller();
    assert_eq!(
        flash.erase_region(ImageKind::Application, 16),
        Err(FlashFault::Hardware(HardwareFault::Locked))
    );
    assert!(flash.port().erase_log().is_empty());
}

#[test]
fn test_oversized_erase_has_no_side_effects() {
    for kind in [ImageKind::Bootloader, ImageKind::Application] {
        let mut flash = ready();
        let max = flash.map().region(kind).max_size;
        let err = flash.erase_region(kind, max + 1).unwrap_err();
        assert_eq!(
            err,
            FlashFault::Config(ConfigFault::ImageTooLarge {
                kind,
                declared: max + 1,
                max,
            })
        );
        assert!(flash.port().erase_log().is_empty());
        assert!(flash.sectors().all(|s| s.state == SectorState::Unknown));
    }
}

#[test]
fn test_erase_covers_image_in_ascending_order() {
    let cases: [(ImageKind, &[u32]); 2] = [
        (ImageKind::Bootloader, &[1, 0x4000, 0x4001, 0xC000, 0xFFFF, 0x10000]),
        (
            ImageKind::Application,
            &[1, 0x1_0000, 0x1_0001, 0x3_0000, 0x5_1234, 0xD_0001, 0xE_FFF8],
        ),
    ];

    for (kind, sizes) in cases {
        for &size in sizes {
            let mut flash = ready();
            flash.erase_region(kind, size).unwrap();

            let map = *flash.map();
            let log = flash.port().erase_log().to_vec();
            let plan = planner::plan_erase(&map, &FirmwareImageRequest::new(kind, size)).unwrap();
            assert_eq!(log.as_slice(), plan.as_slice(), "{} {}", kind, size);
            assert!(log.windows(2).all(|w| w[0] < w[1]));

            let start = map.region(kind).start;
            for sector in map.sectors.iter().filter(|s| s.start < start + size && s.end() > start) {
                assert!(log.contains(&sector.index), "{} {} sector {}", kind, size, sector.index);
            }
            if kind == ImageKind::Application {
                assert_eq!(log.last(), Some(&METADATA_SECTOR));
            }
            for index in &log {
                assert_eq!(flash.sector(*index).unwrap().state, SectorState::Erased);
            }
        }
    }
}

#[test]
fn test_larger_image_extends_erase_plan() {
    let sizes = [1, 0x1_0000, 0x2_0000, 0x3_0001, 0x8_0000, 0xE_FFF8];
    let mut previous: Option<Vec<u8>> = None;

    for size in sizes {
        let mut flash = ready();
        flash.erase_region(ImageKind::Application, size).unwrap();
        let image: Vec<u8> = flash
            .port()
            .erase_log()
            .iter()
            .copied()
            .filter(|&s| s != METADATA_SECTOR)
            .collect();

        if let Some(prev) = &previous {
            assert!(image.starts_with(prev), "{:?} does not extend {:?}", image, prev);
        }
        previous = Some(image);
    }
}

#[test]
fn test_erase_stops_at_failed_sector() {
    let mut flash = ready();
    flash.port_mut().fail_erase(6);

    let err = flash
        .erase_region(ImageKind::Application, 0x6_0000)
        .unwrap_err();
    match err {
        FlashFault::Hardware(HardwareFault::EraseIncomplete { sector, status }) => {
            assert_eq!(sector, 6);
            assert!(status.contains(FlashStatus::OPERR));
        }
        other => panic!("unexpected fault {:?}", other),
    }

    assert_eq!(flash.port().erase_log(), &[4, 5, 6]);
    assert_eq!(flash.sector(5).unwrap().state, SectorState::Erased);
    assert_eq!(flash.sector(6).unwrap().state, SectorState::Unknown);
    assert_eq!(flash.sector(7).unwrap().state, SectorState::Unknown);
}

#[test]
fn test_erase_detects_non_blank_sector() {
    let mut flash = ready();
    let sector = *flash.map().sector(5).unwrap();
    put_word(&mut flash, sector.start + 0x40, 0x1234_5678);
    flash.port_mut().skip_erase(5);

    let err = flash
        .erase_region(ImageKind::Application, 0x2_0000)
        .unwrap_err();
    assert_eq!(
        err,
        FlashFault::Verification(VerifyFailure {
            addr: sector.start + 0x40,
            expected: ERASED_WORD,
            actual: 0x1234_5678,
        })
    );
}

#[test]
fn test_write_verified_programs_buffer() {
    let mut flash = ready();
    flash.erase_region(ImageKind::Application, 0x1_0100).unwrap();

    // Straddles the boundary between sectors 4 and 5
    let addr = APPLICATION_START + 0xFF00;
    let data = pattern(0x200);
    let outcome = flash.write_verified(addr, &data);
    assert!(outcome.succeeded);
    assert_eq!(outcome.bytes_written, 0x200);
    assert_eq!(outcome.fault, None);

    assert_eq!(flash.port().slice(addr, data.len()).unwrap(), data.as_slice());
    assert_eq!(flash.sector(4).unwrap().state, SectorState::Programmed);
    assert_eq!(flash.sector(5).unwrap().state, SectorState::Programmed);
}

#[test]
fn test_write_verified_stops_at_program_fault() {
    let mut flash = ready();
    flash.erase_region(ImageKind::Application, 64).unwrap();

    let k = 10;
    let data = pattern(64);
    flash.port_mut().fail_program_at(APPLICATION_START + k);

    let outcome = flash.write_verified(APPLICATION_START, &data);
    assert!(!outcome.succeeded);
    assert_eq!(outcome.bytes_written, k);
    assert!(matches!(
        outcome.fault,
        Some(FlashFault::Hardware(HardwareFault::ProgramIncomplete { addr, .. }))
            if addr == APPLICATION_START + k
    ));

    let written = flash.port().slice(APPLICATION_START, 64).unwrap();
    assert_eq!(&written[..k as usize], &data[..k as usize]);
    assert!(written[k as usize..].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_write_verified_stops_at_readback_mismatch() {
    let mut flash = ready();
    flash.erase_region(ImageKind::Application, 64).unwrap();

    let mut data = pattern(32);
    data[5] = 0x00;
    flash.port_mut().stick_bits(APPLICATION_START + 5, 0x80);

    let outcome = flash.write_verified(APPLICATION_START, &data);
    assert_eq!(outcome.bytes_written, 5);
    assert_eq!(
        outcome.fault,
        Some(FlashFault::Verification(VerifyFailure {
            addr: APPLICATION_START + 5,
            expected: 0x00,
            actual: 0x80,
        }))
    );
    let after = flash.port().slice(APPLICATION_START + 6, 26).unwrap();
    assert!(after.iter().all(|&b| b == 0xFF));
}

#[test]
fn test_write_verified_rejects_range_outside_flash() {
    let mut flash = ready();
    let end = flash.map().end();

    let outcome = flash.write_verified(end - 2, &[0, 0, 0, 0]);
    assert_eq!(outcome.bytes_written, 0);
    assert!(outcome.fault.map_or(false, |f| f.is_config()));
    assert_eq!(flash.port().program_calls(), 0);
}

#[test]
fn test_write_word_verified() {
    let mut flash = ready();
    flash.erase_region(ImageKind::Application, 4).unwrap();

    flash
        .write_word_verified(APPLICATION_START + 8, 0xA5A5_0F0F)
        .unwrap();
    assert_eq!(flash.read_word(APPLICATION_START + 8), 0xA5A5_0F0F);

    assert_eq!(
        flash.write_word_verified(APPLICATION_START + 2, 0),
        Err(FlashFault::Config(ConfigFault::Misaligned {
            addr: APPLICATION_START + 2
        }))
    );
}

#[test]
fn test_write_word_verified_refuses_dirty_location() {
    let mut flash = ready();
    let offset = (APPLICATION_START - flash.map().base) as usize;
    flash.port_mut().data_mut()[offset] = 0x12;

    assert_eq!(
        flash.write_word_verified(APPLICATION_START, 0x55),
        Err(FlashFault::Verification(VerifyFailure {
            addr: APPLICATION_START,
            expected: ERASED_WORD,
            actual: 0xFFFF_FF12,
        }))
    );
    assert_eq!(flash.read_word(APPLICATION_START), 0xFFFF_FF12);
}

#[test]
fn test_write_word_verified_detects_second_phase_mismatch() {
    let mut flash = ready();
    flash.erase_region(ImageKind::Application, 4).unwrap();
    flash.port_mut().stick_bits(APPLICATION_START + 1, 0x10);

    // The erased value reads back fine; only the target write exposes the stuck bit
    assert_eq!(
        flash.write_word_verified(APPLICATION_START, 0),
        Err(FlashFault::Verification(VerifyFailure {
            addr: APPLICATION_START,
            expected: 0,
            actual: 0x0000_1000,
        }))
    );
    assert_eq!(flash.port().program_calls(), 2);
}

#[test]
fn test_flash_crc_matches_reference() {
    let mut flash = ready();
    flash.erase_region(ImageKind::Application, 1003).unwrap();
    let data = pattern(1003);
    flash
        .write_verified(APPLICATION_START, &data)
        .into_result()
        .unwrap();

    let mut hardware = HardwareCrc32::new(SoftCrcUnit::new());
    for len in [0usize, 1, 2, 3, 4, 5, 1000, 1003] {
        let expected = REFERENCE.checksum(&data[..len]);
        let soft = flash
            .crc32(APPLICATION_START, len as u32, &mut SoftwareCrc32::new())
            .unwrap();
        let hard = flash
            .crc32(APPLICATION_START, len as u32, &mut hardware)
            .unwrap();
        assert_eq!(soft, expected, "len {}", len);
        assert_eq!(hard, expected, "len {}", len);
    }
}

#[test]
fn test_flash_crc_rejects_misaligned_start() {
    let flash = controller();
    for addr in [APPLICATION_START + 1, APPLICATION_START + 2, APPLICATION_START + 3] {
        assert_eq!(
            flash.crc32(addr, 8, &mut SoftwareCrc32::new()),
            Err(FlashFault::Config(ConfigFault::Misaligned { addr }))
        );
    }
    assert!(flash
        .crc32(APPLICATION_START + 4, 3, &mut SoftwareCrc32::new())
        .is_ok());
}

// Metadata store

#[test]
fn test_metadata_round_trip() {
    let mut flash = ready();
    flash.erase_region(ImageKind::Application, 4).unwrap();

    let mut store = MetadataStore::new(&mut flash);
    store
        .write_application_metadata(0x0001_2345, 0xDEAD_BEEF)
        .unwrap();
    assert_eq!(
        store.read_application_metadata(),
        IntegrityRecord {
            application_size: 0x0001_2345,
            application_crc32: 0xDEAD_BEEF,
        }
    );
}

#[test]
fn test_fresh_flash_is_unknown() {
    let mut flash = controller();
    let store = MetadataStore::new(&mut flash);
    assert!(store.read_application_metadata().is_legacy());
    assert_eq!(
        store.validate_application(&mut SoftwareCrc32::new()),
        ImageValidity::Unknown
    );
}

#[test]
fn test_validate_detects_single_byte_corruption() {
    let mut flash = controller();
    let image = pattern(5000);
    install(&mut flash, ImageKind::Application, &image);
    assert_eq!(validity(&flash), ImageValidity::Valid);

    let offset = (APPLICATION_START - flash.map().base) as usize + 4321;
    flash.port_mut().data_mut()[offset] ^= 0x01;
    assert_eq!(validity(&flash), ImageValidity::Invalid);
}

#[test]
fn test_validate_rejects_out_of_bounds_size() {
    let mut flash = controller();
    let map = *flash.map();

    put_word(&mut flash, map.app_size_addr, 0);
    put_word(&mut flash, map.app_crc_addr, 0);
    assert_eq!(validity(&flash), ImageValidity::Invalid);

    put_word(&mut flash, map.app_size_addr, map.application.max_size + 1);
    assert_eq!(validity(&flash), ImageValidity::Invalid);

    // Only the fully erased record counts as unknown
    put_word(&mut flash, map.app_size_addr, ERASED_WORD);
    assert_eq!(validity(&flash), ImageValidity::Invalid);
    put_word(&mut flash, map.app_crc_addr, ERASED_WORD);
    assert_eq!(validity(&flash), ImageValidity::Unknown);
}

#[test]
fn test_validate_with_hardware_engine() {
    let mut flash = controller();
    install(&mut flash, ImageKind::Application, &pattern(0x1_0003));
    let reader = MetadataReader::new(&flash);
    let mut engine = HardwareCrc32::new(SoftCrcUnit::new());
    assert_eq!(reader.validate_application(&mut engine), ImageValidity::Valid);
}

#[test]
fn test_bootloader_version_absent_on_erased_flash() {
    let mut flash = controller();
    let record = MetadataStore::new(&mut flash)
        .read_bootloader_version()
        .unwrap();
    assert_eq!(record.version, VersionField::Absent);
    assert_eq!(record.build_date, VersionField::Absent);
}

#[test]
fn test_bootloader_version_from_installed_image() {
    let mut flash = controller();
    let stamp = BootloaderVersionRecord::new("1.7.0", "2024-05-01 09:30").unwrap();

    let mut image = pattern(0x1_0000);
    let offset = (flash.map().bootloader_version_addr - BOOTLOADER_START) as usize;
    image[offset..offset + 64].copy_from_slice(&stamp.to_bytes());
    install(&mut flash, ImageKind::Bootloader, &image);

    let record = MetadataStore::new(&mut flash)
        .read_bootloader_version()
        .unwrap();
    assert_eq!(record, stamp);
    assert_eq!(record.version.as_str(), Some("1.7.0"));
}

// Update session

#[test]
fn test_application_session() {
    let mut flash = controller();
    let image = pattern(0x1_0000 + 777);
    let request = FirmwareImageRequest::new(ImageKind::Application, image.len() as u32);

    let mut session = UpdateSession::new(&mut flash, request);
    assert_eq!(session.state(), SessionState::Idle);
    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Erased);

    let mut addr = APPLICATION_START;
    for chunk in image.chunks(4096) {
        let outcome = session.write(addr, chunk);
        assert!(outcome.succeeded);
        assert_eq!(outcome.bytes_written, chunk.len() as u32);
        addr += chunk.len() as u32;
        assert_eq!(
            session.state(),
            SessionState::Writing {
                cursor: addr - APPLICATION_START
            }
        );
    }

    let expected = compute_crc32(&image);
    let done = session
        .finish(&mut HardwareCrc32::new(SoftCrcUnit::new()), Some(expected))
        .unwrap();
    assert_eq!(session.state(), SessionState::Complete);
    assert_eq!(done.size, image.len() as u32);
    assert_eq!(done.crc32, expected);

    assert_eq!(flash.port().erase_log(), &[4, 5, 11]);
    assert_eq!(
        MetadataStore::new(&mut flash).read_application_metadata(),
        IntegrityRecord {
            application_size: image.len() as u32,
            application_crc32: expected,
        }
    );
    assert_eq!(validity(&flash), ImageValidity::Valid);
}

#[test]
fn test_bootloader_session_leaves_application_record() {
    let mut flash = controller();
    let app = pattern(3000);
    let app_crc = install(&mut flash, ImageKind::Application, &app);
    flash.port_mut().reset_counters();

    let boot = pattern(0x4100);
    install(&mut flash, ImageKind::Bootloader, &boot);

    assert_eq!(flash.port().erase_log(), &[0, 1]);
    let record = MetadataStore::new(&mut flash).read_application_metadata();
    assert_eq!(record.application_crc32, app_crc);
    assert_eq!(validity(&flash), ImageValidity::Valid);
}

#[test]
fn test_session_calls_out_of_order() {
    let mut flash = controller();
    let request = FirmwareImageRequest::new(ImageKind::Application, 16);
    let mut session = UpdateSession::new(&mut flash, request);

    let outcome = session.write(APPLICATION_START, &[0; 16]);
    assert_eq!(
        outcome.fault,
        Some(FlashFault::Config(ConfigFault::InvalidSessionState))
    );
    assert_eq!(
        session.finish(&mut SoftwareCrc32::new(), None),
        Err(FlashFault::Config(ConfigFault::InvalidSessionState))
    );
    assert_eq!(session.state(), SessionState::Idle);

    session.start().unwrap();
    assert_eq!(
        session.start(),
        Err(FlashFault::Config(ConfigFault::InvalidSessionState))
    );
    assert_eq!(session.state(), SessionState::Erased);
    drop(session);

    assert_eq!(flash.port().program_calls(), 0);
    assert_eq!(flash.port().erase_log(), &[4, 11]);
}

#[test]
fn test_session_rejects_bad_request_before_unlock() {
    for (size, fault) in [
        (0, ConfigFault::EmptyImage),
        (
            0xF_0000,
            ConfigFault::ImageTooLarge {
                kind: ImageKind::Application,
                declared: 0xF_0000,
                max: 0xE_FFF8,
            },
        ),
    ] {
        let mut flash = controller();
        let request = FirmwareImageRequest::new(ImageKind::Application, size);
        let mut session = UpdateSession::new(&mut flash, request);
        assert_eq!(session.start(), Err(FlashFault::Config(fault)));
        assert_eq!(session.state(), SessionState::Idle);
        drop(session);

        assert_eq!(flash.port().unlock_calls(), 0);
        assert!(flash.port().erase_log().is_empty());
    }
}

#[test]
fn test_session_requires_contiguous_writes() {
    let mut flash = controller();
    let request = FirmwareImageRequest::new(ImageKind::Application, 32);
    let mut session = UpdateSession::new(&mut flash, request);
    session.start().unwrap();
    session
        .write(APPLICATION_START, &[1; 8])
        .into_result()
        .unwrap();

    let outcome = session.write(APPLICATION_START + 16, &[2; 8]);
    assert_eq!(
        outcome.fault,
        Some(FlashFault::Config(ConfigFault::NonContiguousWrite {
            expected: APPLICATION_START + 8,
            actual: APPLICATION_START + 16,
        }))
    );

    let outcome = session.write(APPLICATION_START + 8, &[3; 32]);
    assert_eq!(
        outcome.fault,
        Some(FlashFault::Config(ConfigFault::WriteBeyondImage {
            declared: 32,
            end: 40,
        }))
    );
    assert_eq!(session.state(), SessionState::Writing { cursor: 8 });

    assert_eq!(
        session.finish(&mut SoftwareCrc32::new(), None),
        Err(FlashFault::Config(ConfigFault::IncompleteImage {
            written: 8,
            declared: 32,
        }))
    );
    assert_eq!(session.state(), SessionState::Writing { cursor: 8 });
}

#[test]
fn test_failed_write_ends_session() {
    let mut flash = controller();
    let image = pattern(256);
    flash.port_mut().fail_program_at(APPLICATION_START + 100);

    let request = FirmwareImageRequest::new(ImageKind::Application, image.len() as u32);
    let mut session = UpdateSession::new(&mut flash, request);
    session.start().unwrap();

    let outcome = session.write(APPLICATION_START, &image);
    assert_eq!(outcome.bytes_written, 100);
    assert!(outcome.fault.map_or(false, |f| f.needs_erase()));
    assert_eq!(session.state(), SessionState::Failed);

    let outcome = session.write(APPLICATION_START + 100, &image[100..]);
    assert_eq!(
        outcome.fault,
        Some(FlashFault::Config(ConfigFault::InvalidSessionState))
    );
    assert_eq!(
        session.finish(&mut SoftwareCrc32::new(), None),
        Err(FlashFault::Config(ConfigFault::InvalidSessionState))
    );
    drop(session);

    assert!(MetadataStore::new(&mut flash)
        .read_application_metadata()
        .is_legacy());
}

#[test]
fn test_failed_update_is_never_valid() {
    let mut flash = controller();
    install(&mut flash, ImageKind::Application, &pattern(2048));
    assert_eq!(validity(&flash), ImageValidity::Valid);

    flash.port_mut().fail_program_at(APPLICATION_START + 10);
    let request = FirmwareImageRequest::new(ImageKind::Application, 2048);
    let mut session = UpdateSession::new(&mut flash, request);
    session.start().unwrap();
    let _ = session.write(APPLICATION_START, &pattern(2048));
    assert_eq!(session.state(), SessionState::Failed);
    drop(session);

    assert_ne!(validity(&flash), ImageValidity::Valid);
}

#[test]
fn test_expected_crc_mismatch_fails_session() {
    let mut flash = controller();
    let image = pattern(100);
    let request = FirmwareImageRequest::new(ImageKind::Application, 100);
    let mut session = UpdateSession::new(&mut flash, request);
    session.start().unwrap();
    session
        .write(APPLICATION_START, &image)
        .into_result()
        .unwrap();

    let actual = compute_crc32(&image);
    let err = session
        .finish(&mut SoftwareCrc32::new(), Some(actual ^ 1))
        .unwrap_err();
    assert_eq!(
        err,
        FlashFault::Verification(VerifyFailure {
            addr: APPLICATION_START,
            expected: actual ^ 1,
            actual,
        })
    );
    assert_eq!(session.state(), SessionState::Failed);
    drop(session);

    assert_eq!(validity(&flash), ImageValidity::Unknown);
}

#[test]
fn test_erase_failure_fails_session() {
    let mut flash = controller();
    flash.port_mut().fail_erase(METADATA_SECTOR);
    let request = FirmwareImageRequest::new(ImageKind::Application, 64);
    let mut session = UpdateSession::new(&mut flash, request);

    assert!(matches!(
        session.start(),
        Err(FlashFault::Hardware(HardwareFault::EraseIncomplete { sector, .. }))
            if sector == METADATA_SECTOR
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.write(APPLICATION_START, &[0; 4]).fault.is_some());
}

#[test]
fn test_locked_flash_fails_session() {
    let mut flash = controller();
    flash.port_mut().refuse_unlock();
    let request = FirmwareImageRequest::new(ImageKind::Bootloader, 64);
    let mut session = UpdateSession::new(&mut flash, request);

    assert_eq!(
        session.start(),
        Err(FlashFault::Hardware(HardwareFault::Locked))
    );
    assert_eq!(session.state(), SessionState::Failed);
    drop(session);
    assert!(flash.port().erase_log().is_empty());
}

#[test]
fn test_metadata_write_failure_fails_session() {
    let mut flash = controller();
    let map = *flash.map();
    flash.port_mut().fail_program_at(map.app_size_addr);

    let image = pattern(0x800);
    let request = FirmwareImageRequest::new(ImageKind::Application, image.len() as u32);
    let mut session = UpdateSession::new(&mut flash, request);
    session.start().unwrap();
    session
        .write(APPLICATION_START, &image)
        .into_result()
        .unwrap();

    let result = session.finish(&mut SoftwareCrc32::new(), None);
    assert!(matches!(
        result,
        Err(FlashFault::Hardware(HardwareFault::ProgramIncomplete { addr, .. }))
            if addr == map.app_size_addr
    ));
    assert_eq!(session.state(), SessionState::Failed);
    drop(session);

    // CRC word landed, size word did not
    let record = MetadataReader::new(&flash).read_application_metadata();
    assert_eq!(record.application_size, ERASED_WORD);
    assert_eq!(record.application_crc32, REFERENCE.checksum(&image));
    assert_eq!(validity(&flash), ImageValidity::Invalid);
}
