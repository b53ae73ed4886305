use super::helpers::{TIMEOUT, declare_all, test_config};
use pgas::{Collector, LocalCluster};

const HISTOGRAM: u16 = 1;
const MEAN: u16 = 2;

struct Histogram;

impl Collector for Histogram {
    type Item = u8;
    type Acc = Vec<u32>;
    type Output = Vec<u32>;

    fn supply(&self) -> Vec<u32> {
        vec![0; 4]
    }

    fn accumulate(&self, acc: &mut Vec<u32>, item: u8) {
        acc[usize::from(item) % 4] += 1;
    }

    fn combine(&self, acc: &mut Vec<u32>, other: Vec<u32>) {
        for (a, b) in acc.iter_mut().zip(other) {
            *a += b;
        }
    }

    fn finish(&self, acc: Vec<u32>) -> Vec<u32> {
        acc
    }
}

/// Accumulates `[sum, count]` and finishes with their ratio.
struct Mean;

impl Collector for Mean {
    type Item = f64;
    type Acc = Vec<f64>;
    type Output = f64;

    fn supply(&self) -> Vec<f64> {
        vec![0.0, 0.0]
    }

    fn accumulate(&self, acc: &mut Vec<f64>, item: f64) {
        acc[0] += item;
        acc[1] += 1.0;
    }

    fn combine(&self, acc: &mut Vec<f64>, other: Vec<f64>) {
        acc[0] += other[0];
        acc[1] += other[1];
    }

    fn finish(&self, acc: Vec<f64>) -> f64 {
        acc[0] / acc[1]
    }
}

fn cluster(layout: &[u32]) -> LocalCluster {
    LocalCluster::builder()
        .nodes(layout)
        .config(test_config())
        .collector(HISTOGRAM, Histogram)
        .collector(MEAN, Mean)
        .build()
        .unwrap()
}

#[test]
fn test_histogram() {
    let results = cluster(&[3, 2, 4])
        .run(|t| {
            declare_all(&t, "bucket");
            t.put("bucket", &((t.id() % 4) as u8)).unwrap();
            let world = t.world().unwrap();
            world.barrier().get_timeout(TIMEOUT).unwrap();
            world
                .collect::<Vec<u32>>("bucket", HISTOGRAM)
                .get_timeout(TIMEOUT)
                .unwrap()
        })
        .unwrap();
    // ids 0..9 -> buckets 0,1,2,3,0,1,2,3,0
    for r in results {
        assert_eq!(r, vec![3, 2, 2, 2]);
    }
}

#[test]
fn test_finish_changes_type() {
    let results = cluster(&[1, 1, 1, 1, 1])
        .run(|t| {
            declare_all(&t, "sample");
            t.put("sample", &f64::from(t.id() * 2)).unwrap();
            let world = t.world().unwrap();
            world.barrier().get_timeout(TIMEOUT).unwrap();
            world.collect::<f64>("sample", MEAN).get_timeout(TIMEOUT).unwrap()
        })
        .unwrap();
    for r in results {
        assert!((r - 4.0).abs() < 1e-12);
    }
}

#[test]
fn test_unknown_collector() {
    cluster(&[2])
        .run(|t| {
            let err = t
                .world()
                .unwrap()
                .collect::<f64>("sample", 42)
                .get_timeout(TIMEOUT)
                .unwrap_err();
            assert!(err.to_string().contains("collector"), "got: {err}");
        })
        .unwrap();
}
