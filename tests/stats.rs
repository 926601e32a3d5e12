//! Statistics aggregator tests: order invariance, histogram totality,
//! quantile placement, time weighting and serde round-trips.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use chronosim::{
    Entity, EntityContext, ErrorKind, Histogram, Mean, PrecisionHistogram, Quantile, Scheduler,
    SimpleHistogram, SimulationResult, TimeVariance, Variance,
};

#[test]
fn mean_and_variance_are_order_invariant() {
    let samples = [3.5, -1.0, 12.25, 0.0, 7.75, 4.5, -2.25, 9.0];
    let mut forward = Variance::new();
    let mut backward = Variance::new();
    for x in samples {
        forward += x;
    }
    for x in samples.iter().rev() {
        backward += *x;
    }
    assert!((forward.mean() - backward.mean()).abs() < 1e-10);
    let fv = forward.variance().expect("defined");
    let bv = backward.variance().expect("defined");
    assert!((fv - bv).abs() < 1e-10);

    let mut m = Mean::new();
    for x in samples {
        m += x;
    }
    assert!((m.mean() - forward.mean()).abs() < 1e-10);
    assert_eq!(m.count(), forward.count());
}

#[test]
fn variance_below_two_samples_is_undefined() {
    let mut v = Variance::new();
    assert_eq!(
        v.variance().expect_err("empty").kind(),
        ErrorKind::NotYetDefined
    );
    v += 4.0;
    assert_eq!(
        v.stddev().expect_err("one sample").kind(),
        ErrorKind::NotYetDefined
    );
}

#[test]
fn histogram_counts_sum_to_the_total() {
    let mut h = Histogram::new(vec![0.0, 2.5, 5.0, 7.5, 10.0]).expect("valid bounds");
    for i in 0..100 {
        h += (i as f64) * 0.13 - 1.0;
    }
    let bucketed: u64 = h.counts().iter().sum();
    assert_eq!(bucketed + h.overflow_count(), h.total());
    assert_eq!(h.total(), 100);
}

#[test]
fn histogram_places_boundary_samples_inclusively() {
    let mut h = Histogram::new(vec![1.0, 2.0]).expect("valid bounds");
    h += 1.0; // first bucket: bound >= sample
    h += 1.5; // second bucket
    h += 2.0; // second bucket
    h += 2.5; // overflow
    assert_eq!(h.counts(), &[1, 2]);
    assert_eq!(h.overflow_count(), 1);
}

#[test]
fn histogram_rejects_unsorted_bounds() {
    assert_eq!(
        Histogram::new(vec![1.0, 1.0, 2.0])
            .expect_err("duplicate bound")
            .kind(),
        ErrorKind::InvalidParameter
    );
}

#[test]
fn precision_histogram_tracks_distinct_values() {
    let mut h = PrecisionHistogram::new();
    for x in [5.0, 1.0, 5.0, 3.0, 5.0, 1.0] {
        h += x;
    }
    assert_eq!(h.bucket_count(), 3);
    assert_eq!(h.buckets(), &[(1.0, 2), (3.0, 1), (5.0, 3)]);
    let total: u64 = h.buckets().iter().map(|(_, c)| c).sum();
    assert_eq!(total, h.total());
    assert!((h.mean() - 20.0 / 6.0).abs() < 1e-12);
}

#[test]
fn simple_histogram_covers_zero_to_cap() {
    let mut h = SimpleHistogram::new(1.0, 5.0).expect("valid config");
    for x in [0.0, 0.5, 1.0, 1.5, 4.9, 5.0] {
        h += x;
    }
    assert_eq!(h.counts(), &[3, 1, 0, 0, 2]);
    // Out-of-range samples are dropped, not counted.
    h += 6.0;
    h += -0.1;
    assert_eq!(h.total(), 6);
}

#[test]
fn quantile_of_one_to_hundred() {
    let mut q = Quantile::new(0.95).expect("valid q");
    for x in 1..=100 {
        q += x as f64;
    }
    // The 95th of 100 samples sits in the bucket named 95.
    assert_eq!(q.value().expect("defined"), 95.0);

    let mut median = Quantile::new(0.5).expect("valid q");
    for x in 1..=100 {
        median += x as f64;
    }
    assert_eq!(median.value().expect("defined"), 50.0);
}

#[test]
fn quantile_is_undefined_without_samples() {
    let q = Quantile::new(0.9).expect("valid q");
    assert_eq!(
        q.value().expect_err("empty").kind(),
        ErrorKind::NotYetDefined
    );
}

struct LevelTracker {
    tv: Rc<RefCell<TimeVariance>>,
}

#[async_trait(?Send)]
impl Entity for LevelTracker {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        self.tv.borrow_mut().record(2.0);
        ctx.hold(3.0).await?;
        // 2.0 held for 3 time units: area 6.0 folds in here.
        self.tv.borrow_mut().record(4.0);
        ctx.hold(1.0).await?;
        self.tv.borrow_mut().finalize();
        Ok(())
    }
}

#[test]
fn time_variance_weights_by_elapsed_virtual_time() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let tv = Rc::new(RefCell::new(TimeVariance::new()));
    sim.register_entity(LevelTracker { tv: Rc::clone(&tv) })
        .activate()
        .expect("activate");
    sim.run().expect("run");

    let tv = tv.borrow();
    // Recorded areas: 0 (initial), 2*3, then finalize folds 4*1.
    assert_eq!(tv.count(), 3);
    assert!((tv.mean() - (0.0 + 6.0 + 4.0) / 3.0).abs() < 1e-12);
    assert_eq!(tv.current_value(), 4.0);
    sim.terminate();
}

#[test]
fn aggregators_round_trip_through_serde() {
    let mut v = Variance::new();
    let mut h = Histogram::new(vec![1.0, 2.0, 3.0]).expect("valid bounds");
    let mut p = PrecisionHistogram::new();
    let mut q = Quantile::new(0.75).expect("valid q");
    for x in [0.5, 1.5, 2.5, 3.5, 1.5] {
        v += x;
        h += x;
        p += x;
        q += x;
    }

    let v2: Variance =
        serde_json::from_str(&serde_json::to_string(&v).expect("serialize")).expect("parse");
    assert_eq!(v, v2);

    let h2: Histogram =
        serde_json::from_str(&serde_json::to_string(&h).expect("serialize")).expect("parse");
    assert_eq!(h, h2);

    let p2: PrecisionHistogram =
        serde_json::from_str(&serde_json::to_string(&p).expect("serialize")).expect("parse");
    assert_eq!(p, p2);

    let q2: Quantile =
        serde_json::from_str(&serde_json::to_string(&q).expect("serialize")).expect("parse");
    assert_eq!(q.value().expect("defined"), q2.value().expect("defined"));
}
