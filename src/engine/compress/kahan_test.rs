use crate::engine::compress::kahan::KahanPair;

#[test]
fn compensated_sum_beats_naive_on_small_terms() {
    let mut kahan = KahanPair::default();
    let mut naive = 0.0f64;
    kahan.add(1.0);
    naive += 1.0;
    for _ in 0..10_000_000 {
        kahan.add(1e-16);
        naive += 1e-16;
    }
    let expected = 1.0 + 10_000_000.0 * 1e-16;
    assert!((kahan.value() - expected).abs() < (naive - expected).abs());
    assert!((kahan.value() - expected).abs() < 1e-12);
}

#[test]
fn merge_carries_correction() {
    let mut a = KahanPair::default();
    let mut b = KahanPair::default();
    for i in 0..1000 {
        a.add(1e-16 * i as f64);
        b.add(1.0);
    }
    let mut merged = a;
    merged.merge(b);

    let mut reference = KahanPair::default();
    for i in 0..1000 {
        reference.add(1e-16 * i as f64);
    }
    for _ in 0..1000 {
        reference.add(1.0);
    }
    assert!((merged.value() - reference.value()).abs() < 1e-12);
}

#[test]
fn sum_of_squares() {
    let mut p = KahanPair::default();
    p.add_sq(3.0);
    p.add_sq(4.0);
    assert_eq!(p.value(), 25.0);
}
