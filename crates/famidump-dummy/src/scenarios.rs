//! End-to-end sessions against the emulator

use std::time::Duration;

use famidump_core::bank::{ControllerRevision, BANK_SIZE};
use famidump_core::dumper::Dumper;
use famidump_core::error::{BlockFault, Error};
use famidump_core::fds::{
    self, DiskInfo, DiskSide, DumpOptions, FdsBlock, FdsImage, FileHeader, FileKind, FDS_TIMEOUT,
};
use famidump_core::flash::{
    cartridge_info, detect_revision, verify_prg, write_prg, NoProgress, WriteOptions,
};
use famidump_core::operator::{Cue, InstantWaiter, Operator, Unattended};

use super::{DummyConfig, DummyDumper, SWAP_POLLS};

const MB: usize = 1024 * 1024;

fn dumper() -> DummyDumper {
    DummyDumper::new(DummyConfig {
        flash_size: MB,
        ..Default::default()
    })
}

/// Image whose every bank starts with its own number
fn image(banks: usize) -> Vec<u8> {
    let mut prg = vec![0u8; banks * BANK_SIZE];
    for (bank, chunk) in prg.chunks_mut(BANK_SIZE).enumerate() {
        chunk.iter_mut().enumerate().for_each(|(i, b)| *b = (i + bank) as u8);
    }
    prg
}

#[derive(Default)]
struct CountingOperator {
    cues: Vec<Cue>,
    confirms: usize,
    announcements: Vec<String>,
}

impl Operator for CountingOperator {
    fn announce(&mut self, message: &str) {
        self.announcements.push(message.to_string());
    }

    fn cue(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    fn confirm(&mut self, _message: &str) -> famidump_core::Result<()> {
        self.confirms += 1;
        Ok(())
    }
}

#[test]
fn test_detects_both_revisions() {
    for revision in [ControllerRevision::A, ControllerRevision::B] {
        let mut dumper = DummyDumper::new(DummyConfig {
            revision: Some(revision),
            flash_size: MB,
            ..Default::default()
        });
        assert_eq!(detect_revision(&mut dumper).unwrap(), revision);
    }
}

#[test]
fn test_detection_fails_without_coolboy() {
    let mut dumper = DummyDumper::new(DummyConfig {
        revision: None,
        flash_size: MB,
        ..Default::default()
    });
    assert!(matches!(
        detect_revision(&mut dumper),
        Err(Error::DetectionFailed {
            v6000: 0xFF,
            v5000: 0xFF
        })
    ));
    let prg = image(8);
    assert!(write_prg(
        &mut dumper,
        &mut Unattended,
        &prg,
        &WriteOptions::default(),
        &mut NoProgress
    )
    .is_err());
    assert!(dumper.journal().erased.is_empty());
}

#[test]
fn test_write_and_verify_revision_b() {
    let mut dumper = DummyDumper::new(DummyConfig {
        revision: Some(ControllerRevision::B),
        flash_size: MB,
        ..Default::default()
    });
    let prg = image(12);
    let options = WriteOptions {
        verify: true,
        ..Default::default()
    };
    let report = write_prg(&mut dumper, &mut Unattended, &prg, &options, &mut NoProgress).unwrap();
    assert_eq!(report.total_errors, 0);
    assert!(report.wrong_crc_sectors.is_empty());
    assert_eq!(&dumper.flash_data()[..prg.len()], &prg[..]);
    assert_eq!(dumper.journal().erased, vec![0, 1]);
    assert_eq!(dumper.journal().programmed, (0..12).collect::<Vec<_>>());
    assert_eq!(dumper.journal().flash_buffer_size, Some(64));
}

#[test]
fn test_prelisted_bad_sector_is_never_touched() {
    // (banks, bad sectors), including a partial last sector and sector 0
    let runs: [(usize, &[usize]); 6] = [
        (16, &[1]),
        (12, &[1]),
        (16, &[0]),
        (24, &[1]),
        (20, &[0, 2]),
        (8, &[0]),
    ];
    for (banks, bad) in runs {
        let prg = image(banks);
        let sectors = banks.div_ceil(8);
        let good_banks: Vec<usize> = (0..banks).filter(|b| !bad.contains(&(b / 8))).collect();
        let good_sectors: Vec<usize> = (0..sectors).filter(|s| !bad.contains(s)).collect();

        let mut dumper = dumper();
        let options = WriteOptions {
            bad_sectors: bad.to_vec(),
            verify: true,
            ..Default::default()
        };
        match write_prg(&mut dumper, &mut Unattended, &prg, &options, &mut NoProgress) {
            Err(Error::Integrity {
                bad_sectors,
                wrong_crc_sectors,
            }) => {
                assert_eq!(bad_sectors, bad, "{} banks", banks);
                assert!(wrong_crc_sectors.is_empty());
            }
            other => panic!("{} banks: unexpected {:?}", banks, other),
        }

        let journal = dumper.journal();
        assert_eq!(journal.erased, good_sectors, "{} banks", banks);
        assert_eq!(journal.programmed, good_banks, "{} banks", banks);
        assert_eq!(journal.crc_requests, good_banks, "{} banks", banks);
        for &sector in bad {
            let end = ((sector + 1) * 8).min(banks) * BANK_SIZE;
            assert!(dumper.flash_data()[sector * 8 * BANK_SIZE..end]
                .iter()
                .all(|&b| b == 0xFF));
        }

        // the same list without verification only reports
        let mut dumper = self::dumper();
        let options = WriteOptions {
            bad_sectors: bad.to_vec(),
            ..Default::default()
        };
        let report =
            write_prg(&mut dumper, &mut Unattended, &prg, &options, &mut NoProgress).unwrap();
        assert_eq!(report.bad_sectors.iter().copied().collect::<Vec<_>>(), bad);
        assert_eq!(report.total_errors, 0);
        assert_eq!(dumper.journal().programmed, good_banks);
        assert!(dumper.journal().crc_requests.is_empty());
    }
}

#[test]
fn test_crc_mismatch_fails_with_integrity_error() {
    let mut dumper = dumper();
    dumper.corrupt_crc(3);
    let prg = image(16);
    let options = WriteOptions {
        verify: true,
        ..Default::default()
    };
    match write_prg(&mut dumper, &mut Unattended, &prg, &options, &mut NoProgress) {
        Err(Error::Integrity {
            bad_sectors,
            wrong_crc_sectors,
        }) => {
            assert!(bad_sectors.is_empty());
            assert_eq!(wrong_crc_sectors, vec![0]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_verify_is_repeatable() {
    let mut dumper = dumper();
    let prg = image(16);
    write_prg(
        &mut dumper,
        &mut Unattended,
        &prg,
        &WriteOptions::default(),
        &mut NoProgress,
    )
    .unwrap();
    dumper.corrupt_crc(10);

    let run = |dumper: &mut DummyDumper| match verify_prg(
        dumper,
        &mut Unattended,
        &prg,
        &[],
        true,
        &mut NoProgress,
    ) {
        Err(Error::Integrity {
            bad_sectors,
            wrong_crc_sectors,
        }) => (bad_sectors, wrong_crc_sectors),
        other => panic!("unexpected {:?}", other),
    };
    let first = run(&mut dumper);
    let programmed = dumper.journal().programmed.len();
    let second = run(&mut dumper);
    assert_eq!(first, second);
    assert_eq!(first.1, vec![1]);
    assert_eq!(dumper.journal().programmed.len(), programmed);
}

#[test]
fn test_transient_failure_restarts_sector() {
    let mut dumper = dumper();
    dumper.fail_bank_writes(10, 2);
    let prg = image(16);
    let mut operator = CountingOperator::default();
    let options = WriteOptions {
        verify: true,
        ..Default::default()
    };
    let report = write_prg(&mut dumper, &mut operator, &prg, &options, &mut NoProgress).unwrap();

    assert_eq!(report.total_errors, 2);
    assert!(report.bad_sectors.is_empty());
    assert_eq!(operator.cues, vec![Cue::Error, Cue::Error]);
    // sector 1 erased once per attempt
    assert_eq!(dumper.journal().erased, vec![0, 1, 1, 1]);
    assert_eq!(&dumper.flash_data()[..prg.len()], &prg[..]);
}

#[test]
fn test_persistent_failure_aborts() {
    let mut dumper = dumper();
    dumper.fail_sector(1);
    let prg = image(24);
    match write_prg(
        &mut dumper,
        &mut Unattended,
        &prg,
        &WriteOptions::default(),
        &mut NoProgress,
    ) {
        Err(Error::SectorFailed {
            sector, attempts, ..
        }) => {
            assert_eq!(sector, 1);
            assert_eq!(attempts, 5);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(dumper.journal().programmed.iter().all(|&bank| bank < 8));
}

#[test]
fn test_persistent_failure_marks_sector_bad() {
    let mut dumper = dumper();
    dumper.fail_sector(1);
    let prg = image(24);
    let options = WriteOptions {
        ignore_bad_sectors: true,
        ..Default::default()
    };
    let report = write_prg(&mut dumper, &mut Unattended, &prg, &options, &mut NoProgress).unwrap();
    assert_eq!(report.total_errors, 5);
    assert_eq!(report.new_bad_sectors.iter().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(
        dumper.journal().programmed,
        (0..8).chain(16..24).collect::<Vec<_>>()
    );

    // a verified run with a newly bad sector fails, and never reads sector 1
    let mut dumper = self::dumper();
    dumper.fail_sector(1);
    let options = WriteOptions {
        ignore_bad_sectors: true,
        verify: true,
        silent: true,
        ..Default::default()
    };
    let mut operator = CountingOperator::default();
    match write_prg(&mut dumper, &mut operator, &prg, &options, &mut NoProgress) {
        Err(Error::Integrity {
            bad_sectors,
            wrong_crc_sectors,
        }) => {
            assert_eq!(bad_sectors, vec![1]);
            assert!(wrong_crc_sectors.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(operator.cues.is_empty());
    assert!(dumper
        .journal()
        .crc_requests
        .iter()
        .all(|&bank| !(8..16).contains(&bank)));
}

#[test]
fn test_image_too_large() {
    let mut dumper = dumper();
    let prg = image(MB / BANK_SIZE + 8);
    assert!(matches!(
        write_prg(
            &mut dumper,
            &mut Unattended,
            &prg,
            &WriteOptions::default(),
            &mut NoProgress
        ),
        Err(Error::ImageTooLarge { .. })
    ));
    assert!(dumper.journal().erased.is_empty());
}

#[test]
fn test_odd_image_size_rejected() {
    let mut dumper = dumper();
    let prg = vec![0u8; BANK_SIZE + 1];
    assert!(matches!(
        write_prg(
            &mut dumper,
            &mut Unattended,
            &prg,
            &WriteOptions::default(),
            &mut NoProgress
        ),
        Err(Error::InvalidImage(_))
    ));
}

#[test]
fn test_write_protect_and_clear() {
    let mut dumper = dumper();
    let prg = image(12);
    let options = WriteOptions {
        write_protect: true,
        ..Default::default()
    };
    write_prg(&mut dumper, &mut Unattended, &prg, &options, &mut NoProgress).unwrap();
    assert!(dumper.is_protected(0));
    assert!(dumper.is_protected(1));
    assert!(!dumper.is_protected(2));

    let info = cartridge_info(&mut dumper).unwrap();
    assert!(info.sector0_protected);
    assert_eq!(info.flash.device_size, MB);

    // protection is cleared before the next write
    write_prg(
        &mut dumper,
        &mut Unattended,
        &image(8),
        &WriteOptions::default(),
        &mut NoProgress,
    )
    .unwrap();
    assert!(!dumper.is_protected(0));
}

#[test]
fn test_pause_before_verify() {
    let mut dumper = dumper();
    let mut operator = CountingOperator::default();
    let options = WriteOptions {
        verify: true,
        pause_before_verify: true,
        ..Default::default()
    };
    write_prg(&mut dumper, &mut operator, &image(8), &options, &mut NoProgress).unwrap();
    assert_eq!(operator.confirms, 1);
    assert_eq!(operator.cues, vec![Cue::Done]);
}

fn disk_side(name: &str, side: u8, declared: u8, files: usize) -> Vec<FdsBlock> {
    let mut blocks = vec![
        FdsBlock::disk_info(DiskInfo::new(name, 0, side)),
        FdsBlock::file_amount(declared),
    ];
    for i in 0..files {
        let data = vec![i as u8; 100 + i];
        blocks.push(FdsBlock::file_header(FileHeader::new(
            i as u8,
            i as u8,
            "FILE",
            0x6000,
            data.len() as u16,
            FileKind::Program,
        )));
        blocks.push(FdsBlock::file_data(data));
    }
    blocks
}

#[test]
fn test_dump_two_sides_with_swap() {
    let mut dumper = dumper().with_disks(vec![
        disk_side("TST", 0, 2, 3),
        disk_side("TST", 1, 1, 1),
    ]);
    let mut waiter = InstantWaiter::default();
    let mut operator = CountingOperator::default();
    let options = DumpOptions {
        sides: 2,
        hidden_files: true,
    };
    let image = fds::dump(&mut dumper, &mut waiter, &mut operator, &options).unwrap();

    assert_eq!(image.sides().len(), 2);
    assert_eq!(image.sides()[0].hidden_files(), 1);
    assert_eq!(image.sides()[1].file_amount(), 1);
    assert_eq!(
        operator.announcements,
        vec!["Please remove disk card", "Please set disk card, side #2"]
    );
    // the first poll of each swap needs no wait
    assert_eq!(waiter.waits, 2 * (SWAP_POLLS - 1));
    assert_eq!(
        dumper.journal().timeouts,
        vec![FDS_TIMEOUT, Duration::from_millis(1000)]
    );
}

#[test]
fn test_dump_slow_path_matches_fast_path() {
    let disks = vec![disk_side("TST", 0, 2, 4)];
    let mut fast = dumper().with_disks(disks.clone());
    let mut slow = DummyDumper::new(DummyConfig {
        flash_size: MB,
        max_read_packet_size: 1024,
        ..Default::default()
    })
    .with_disks(disks);

    let options = DumpOptions::default();
    let a = fds::dump(&mut fast, &mut InstantWaiter::default(), &mut Unattended, &options).unwrap();
    let b = fds::dump(&mut slow, &mut InstantWaiter::default(), &mut Unattended, &options).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.sides()[0].hidden_files(), 2);
}

#[test]
fn test_dump_corruption_boundary() {
    for slow in [false, true] {
        let config = DummyConfig {
            flash_size: MB,
            max_read_packet_size: if slow { 1024 } else { usize::from(u16::MAX) },
            ..Default::default()
        };

        // file data of the second declared file: fatal
        let mut disk = disk_side("TST", 0, 2, 3);
        disk[5] = disk[5].clone().with_bad_crc();
        let mut dumper = DummyDumper::new(config.clone()).with_disks(vec![disk]);
        assert!(matches!(
            fds::dump(
                &mut dumper,
                &mut InstantWaiter::default(),
                &mut Unattended,
                &DumpOptions::default()
            ),
            Err(Error::InvalidBlock {
                index: 5,
                fault: BlockFault::Crc,
                ..
            })
        ));
        assert_eq!(dumper.timeout(), Duration::from_millis(1000));

        // same corruption on the hidden file: trimmed
        let mut disk = disk_side("TST", 0, 2, 3);
        disk[7] = disk[7].clone().with_bad_crc();
        let mut dumper = DummyDumper::new(config).with_disks(vec![disk]);
        let image = fds::dump(
            &mut dumper,
            &mut InstantWaiter::default(),
            &mut Unattended,
            &DumpOptions::default(),
        )
        .unwrap();
        assert_eq!(image.sides()[0].blocks().len(), 6);
        assert_eq!(image.sides()[0].hidden_files(), 0);
    }
}

#[test]
fn test_write_image_to_blank_disks() {
    let image = FdsImage::new(vec![
        DiskSide::new(disk_side("TST", 0, 2, 2)).unwrap(),
        DiskSide::new(disk_side("TST", 1, 1, 1)).unwrap(),
    ]);
    let mut dumper = DummyDumper::new(DummyConfig {
        flash_size: MB,
        max_write_packet_size: 200,
        ..Default::default()
    })
    .with_disks(vec![Vec::new(), Vec::new()]);
    let mut operator = CountingOperator::default();
    fds::write(&mut dumper, &mut InstantWaiter::default(), &mut operator, &image).unwrap();

    let drive = dumper.drive();
    assert_eq!(drive.ejected().len(), 1);
    assert_eq!(drive.ejected()[0], image.sides()[0].blocks());
    assert_eq!(drive.loaded(), Some(image.sides()[1].blocks()));
    assert_eq!(dumper.timeout(), Duration::from_millis(1000));
}

#[test]
fn test_write_without_adapter() {
    let image = FdsImage::new(vec![DiskSide::new(disk_side("TST", 0, 0, 0)).unwrap()]);
    let mut dumper = DummyDumper::new(DummyConfig {
        flash_size: MB,
        fds_adapter: false,
        ..Default::default()
    })
    .with_disks(vec![Vec::new()]);
    assert!(matches!(
        fds::write(&mut dumper, &mut InstantWaiter::default(), &mut Unattended, &image),
        Err(Error::AdapterNotConnected)
    ));
    assert_eq!(dumper.timeout(), Duration::from_millis(1000));
    assert_eq!(dumper.drive().loaded(), Some(&[][..]));
}

#[test]
fn test_fds_needs_protocol_3() {
    let mut dumper = DummyDumper::new(DummyConfig {
        flash_size: MB,
        protocol_version: 2,
        ..Default::default()
    })
    .with_disks(vec![disk_side("TST", 0, 0, 0)]);
    assert!(matches!(
        fds::dump(
            &mut dumper,
            &mut InstantWaiter::default(),
            &mut Unattended,
            &DumpOptions::default()
        ),
        Err(Error::UnsupportedProtocol { .. })
    ));
    assert!(dumper.journal().timeouts.is_empty());
}
