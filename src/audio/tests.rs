use super::recorder::{CaptureStats, CaptureTap};
use super::ring;
use super::wav::WavSink;
use super::writer::{drain_for_tests, DiskWriter};
use super::{ring_capacity, NUM_CHANNELS, SAMPLE_RATE};
use crate::gate::PauseGate;
use std::thread;
use std::time::Duration;

fn pcm_of(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn read_pcm(path: &std::path::Path) -> Vec<i16> {
    let mut reader = hound::WavReader::open(path).expect("output opens");
    reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .expect("samples decode")
}

#[test]
fn ring_rejects_non_power_of_two_capacity() {
    assert!(ring::with_capacity(0).is_err());
    assert!(ring::with_capacity(3).is_err());
    assert!(ring::with_capacity(48_000).is_err());
    assert!(ring::with_capacity(64).is_ok());
}

#[test]
fn ring_default_capacity_is_half_a_second_rounded_up() {
    assert_eq!(ring_capacity(), 65_536);
    assert!(ring_capacity() >= (SAMPLE_RATE as usize / 2) * NUM_CHANNELS as usize);
}

#[test]
fn ring_write_never_exceeds_free_space() {
    let (mut producer, consumer) = ring::with_capacity(8).expect("ring allocates");
    assert_eq!(producer.try_write(&[1.0; 6]), 6);
    assert_eq!(producer.write_available(), 2);
    // Only two slots left; the rest of this burst is dropped.
    assert_eq!(producer.try_write(&[2.0; 5]), 2);
    assert_eq!(producer.write_available(), 0);
    assert_eq!(producer.try_write(&[3.0; 4]), 0);
    assert_eq!(consumer.read_available(), 8);
}

#[test]
fn ring_preserves_submission_order_across_wraparound() {
    let (mut producer, mut consumer) = ring::with_capacity(8).expect("ring allocates");
    assert_eq!(producer.try_write(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), 6);
    {
        let (first, second) = consumer.read_regions();
        assert_eq!(first, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(second.is_empty());
    }
    consumer.advance_read(6);

    // Next write wraps: two slots at the end, the rest at the start.
    assert_eq!(producer.try_write(&[6.0, 7.0, 8.0, 9.0]), 4);
    let (first, second) = consumer.read_regions();
    assert_eq!(first, &[6.0, 7.0]);
    assert_eq!(second, &[8.0, 9.0]);
}

#[test]
fn ring_sustained_overrun_drops_excess_without_corruption() {
    let (mut producer, mut consumer) = ring::with_capacity(16).expect("ring allocates");
    let mut submitted = Vec::new();
    for burst in 0..50 {
        let chunk: Vec<f32> = (0..7).map(|i| (burst * 7 + i) as f32).collect();
        let written = producer.try_write(&chunk);
        submitted.extend_from_slice(&chunk[..written]);
        assert!(consumer.read_available() <= consumer.capacity());
    }
    // Whatever survived must come back in submission order.
    let mut drained = Vec::new();
    while consumer.read_available() > 0 {
        let take = {
            let (first, second) = consumer.read_regions();
            drained.extend_from_slice(first);
            drained.extend_from_slice(second);
            first.len() + second.len()
        };
        consumer.advance_read(take);
    }
    assert_eq!(drained, submitted);
}

#[test]
fn ring_spsc_threads_deliver_every_written_element_in_order() {
    let (mut producer, mut consumer) = ring::with_capacity(1_024).expect("ring allocates");
    let total = 100_000usize;
    let writer = thread::spawn(move || {
        let mut written = 0usize;
        let mut next = 0usize;
        while next < total {
            let end = (next + 64).min(total);
            let chunk: Vec<f32> = (next..end).map(|v| v as f32).collect();
            written += producer.try_write(&chunk);
            next = end;
            thread::yield_now();
        }
        written
    });

    let mut drained: Vec<f32> = Vec::new();
    while !writer.is_finished() || consumer.read_available() > 0 {
        let take = {
            let (first, second) = consumer.read_regions();
            drained.extend_from_slice(first);
            drained.extend_from_slice(second);
            first.len() + second.len()
        };
        consumer.advance_read(take);
        if take == 0 {
            thread::yield_now();
        }
    }
    let written = writer.join().expect("producer thread");
    assert_eq!(drained.len(), written);
    // Survivors are a subsequence of the ramp: strictly increasing values.
    for pair in drained.windows(2) {
        assert!(pair[0] < pair[1], "out-of-order elements {pair:?}");
    }
}

#[test]
fn paused_gate_suppresses_all_ring_writes() {
    let (producer, consumer) = ring::with_capacity(256).expect("ring allocates");
    let gate = PauseGate::new();
    let stats = CaptureStats::new();
    let mut tap = CaptureTap::new(gate.clone(), producer, stats.clone(), [0, 1], 2);

    gate.set(true);
    for _ in 0..100 {
        tap.write_block(&[0.25f32; 64], |s| s);
    }
    assert_eq!(consumer.read_available(), 0);
    assert_eq!(stats.frames_captured(), 0);
    assert_eq!(stats.samples_dropped(), 0);

    gate.set(false);
    tap.write_block(&[0.25f32; 64], |s| s);
    assert_eq!(consumer.read_available(), 64);
    assert_eq!(stats.frames_captured(), 32);
}

#[test]
fn tap_selects_the_configured_channels_from_interleaved_frames() {
    let (producer, mut consumer) = ring::with_capacity(64).expect("ring allocates");
    let gate = PauseGate::new();
    let stats = CaptureStats::new();
    // Four-channel device, recording channels 2 and 0.
    let mut tap = CaptureTap::new(gate, producer, stats.clone(), [2, 0], 4);
    let block = [
        10.0f32, 11.0, 12.0, 13.0, // frame 0
        20.0, 21.0, 22.0, 23.0, // frame 1
    ];
    tap.write_block(&block, |s| s);
    let (first, second) = consumer.read_regions();
    assert_eq!(first, &[12.0, 10.0, 22.0, 20.0]);
    assert!(second.is_empty());
    assert_eq!(stats.frames_captured(), 2);
    consumer.advance_read(4);
}

#[test]
fn tap_counts_overrun_drops_instead_of_failing() {
    let (producer, _consumer) = ring::with_capacity(16).expect("ring allocates");
    let gate = PauseGate::new();
    let stats = CaptureStats::new();
    let mut tap = CaptureTap::new(gate, producer, stats.clone(), [0, 1], 2);
    tap.write_block(&[0.5f32; 64], |s| s); // 32 frames into a 16-element ring
    assert_eq!(stats.frames_captured(), 8);
    assert_eq!(stats.samples_dropped(), 48);
}

#[test]
fn wav_sink_appends_are_a_valid_file_after_every_chunk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("chunks.wav");
    let sink = WavSink::create(&path).expect("sink creates");
    assert_eq!(read_pcm(&path).len(), 0);

    sink.append(&[0.0, 0.5]).expect("first chunk");
    assert_eq!(read_pcm(&path).len(), 2);

    sink.append(&[-0.5, 1.0, -1.0, 0.25]).expect("second chunk");
    let pcm = read_pcm(&path);
    assert_eq!(pcm.len(), 6);
    assert_eq!(pcm[0], 0);
    assert_eq!(pcm[1], pcm_of(0.5));
    assert_eq!(pcm[3], i16::MAX);
}

#[test]
fn five_seconds_of_bursts_land_on_disk_gapless() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bursts.wav");
    let sink = WavSink::create(&path).expect("sink creates");
    let (mut producer, mut consumer) =
        ring::with_capacity(ring_capacity()).expect("ring allocates");
    let threshold = consumer.capacity() / 4;
    assert!(threshold >= 16_384);

    // 44_100 stereo frames per second for five seconds, in callback-sized
    // chunks, draining whenever the batch threshold is reached.
    let per_second = (SAMPLE_RATE as usize) * NUM_CHANNELS as usize;
    let mut submitted: Vec<f32> = Vec::with_capacity(per_second * 5);
    let mut pending = Vec::with_capacity(1_024);
    for index in 0..per_second * 5 {
        pending.push(((index % 20_000) as f32 / 20_000.0) - 0.5);
        if pending.len() == 1_024 {
            assert_eq!(producer.try_write(&pending), pending.len(), "unexpected overrun");
            submitted.extend_from_slice(&pending);
            pending.clear();
            if consumer.read_available() >= threshold {
                drain_for_tests(&mut consumer, &sink).expect("drain succeeds");
            }
        }
    }
    assert_eq!(producer.try_write(&pending), pending.len());
    submitted.extend_from_slice(&pending);
    drain_for_tests(&mut consumer, &sink).expect("final drain");

    let mut reader = hound::WavReader::open(&path).expect("output opens");
    assert_eq!(reader.duration(), 220_500);
    assert_eq!(reader.spec().channels, NUM_CHANNELS);
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    let pcm: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .expect("samples decode");
    assert_eq!(pcm.len(), submitted.len());
    for (got, expected) in pcm.iter().zip(submitted.iter().map(|&s| pcm_of(s))) {
        assert_eq!(*got, expected);
    }
}

#[test]
fn disk_writer_flushes_everything_on_stop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("writer.wav");
    let sink = WavSink::create(&path).expect("sink creates");
    let (mut producer, consumer) = ring::with_capacity(65_536).expect("ring allocates");
    let mut writer = DiskWriter::spawn(consumer, sink).expect("writer spawns");

    let mut submitted = 0usize;
    for burst in 0..20 {
        let chunk: Vec<f32> = (0..2_048).map(|i| ((burst * 2_048 + i) % 100) as f32 / 100.0).collect();
        submitted += producer.try_write(&chunk);
        thread::sleep(Duration::from_millis(2));
    }
    writer.stop().expect("writer stops cleanly");

    let pcm = read_pcm(&path);
    assert_eq!(pcm.len(), submitted);
}

#[test]
fn disk_writer_stop_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("idempotent.wav");
    let sink = WavSink::create(&path).expect("sink creates");
    let (_producer, consumer) = ring::with_capacity(1_024).expect("ring allocates");
    let mut writer = DiskWriter::spawn(consumer, sink).expect("writer spawns");
    assert!(writer.stop().is_ok());
    assert!(writer.stop().is_ok());
}
