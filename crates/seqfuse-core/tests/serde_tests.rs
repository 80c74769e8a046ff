//! Round-trip tests for the value-copy serialization contract
//!
//! Every parameter and result type must survive a trip through a binary
//! serializer unchanged, so Monte-Carlo workers can hand results back by
//! value.

use seqfuse_core::{
    AdaptiveParams, DiscardReason, DiscardedRecord, Duration, FixedLagParams, Measurement, Mode,
    PopResult, ReleasedRecord, SourceId, Timestamp,
};
use serde::{de::DeserializeOwned, Serialize};

fn roundtrip<T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug>(value: &T) {
    let bytes = rmp_serde::to_vec(value).expect("encode");
    let back: T = rmp_serde::from_slice(&bytes).expect("decode");
    assert_eq!(&back, value);
}

fn ms(v: i64) -> Timestamp {
    Timestamp::from_epoch_millis(v)
}

#[test]
fn time_types_roundtrip() {
    roundtrip(&ms(123));
    roundtrip(&Timestamp::from_epoch_micros(-1));
    roundtrip(&Duration::from_micros(123_380));
    roundtrip(&Duration::from_millis(-5));
}

#[test]
fn adaptive_params_roundtrip() {
    roundtrip(&AdaptiveParams::default());
    roundtrip(
        &AdaptiveParams::default()
            .with_mode(Mode::Match)
            .with_jitter_quantile(0.95)
            .with_max_jitter(Duration::from_millis(250))
            .with_max_wait_duration(Duration::from_millis(500))
            .with_warmup_threshold(8)
            .with_history_size(128),
    );
}

#[test]
fn fixed_lag_params_roundtrip() {
    roundtrip(&FixedLagParams::Lag(Duration::from_millis_f64(123.38)));
    roundtrip(&FixedLagParams::Derived {
        delay_mean: Duration::from_millis(100),
        delay_stddev: Duration::from_millis(10),
        delay_quantile: 0.99,
    });
}

#[test]
fn records_roundtrip() {
    let measurement = Measurement {
        id: SourceId(3),
        receipt_time: ms(110),
        meas_time: ms(100),
        payload: String::from("imu"),
    };
    roundtrip(&measurement);

    let released = ReleasedRecord {
        id: SourceId(3),
        meas_time: ms(100),
        receipt_time: ms(110),
        earliest_meas_time: ms(95),
        latest_receipt_time: ms(112),
        payload: String::from("imu"),
    };
    roundtrip(&released);

    roundtrip(&DiscardedRecord {
        record: released,
        reason: DiscardReason::OutOfOrderAtRelease,
    });
    roundtrip(&DiscardReason::ExpiredWait);
}

#[test]
fn pop_result_roundtrips_with_data_and_discards() {
    let make = |meas: i64, receipt: i64| ReleasedRecord {
        id: SourceId(0),
        meas_time: ms(meas),
        receipt_time: ms(receipt),
        earliest_meas_time: ms(meas),
        latest_receipt_time: ms(receipt),
        payload: meas as u64,
    };
    let result = PopResult {
        buffer_time: ms(200),
        data: vec![make(100, 110), make(105, 130)],
        discarded_data: vec![DiscardedRecord {
            record: make(90, 140),
            reason: DiscardReason::OutOfOrderAtRelease,
        }],
    };
    roundtrip(&result);

    let empty: PopResult<u64> = PopResult {
        buffer_time: ms(5),
        data: Vec::new(),
        discarded_data: Vec::new(),
    };
    roundtrip(&empty);
}
