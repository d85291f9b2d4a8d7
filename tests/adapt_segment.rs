use anyhow::Result;
use fxhash::FxHashSet;
use htm_plasticity::{
    adapt_segment, CellIdx, Connections, ConnectionsParams, HtmError, TemporalMemory,
    TemporalMemoryParams,
};

fn cells(indices: &[usize]) -> FxHashSet<CellIdx> {
    indices.iter().map(|&c| CellIdx(c)).collect()
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("synapse is missing");
    assert!(
        (actual - expected).abs() < f64::EPSILON,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn permanence_strengthened_if_presynaptic_cell_was_active() -> Result<()> {
    let conns = Connections::default();
    let params = TemporalMemoryParams::default();
    let mut segment = conns.create_distal_segment(CellIdx(0));
    let synapse = segment.add_synapse(&conns, CellIdx(23), 0.1)?;

    adapt_segment(
        &conns,
        &mut segment,
        &cells(&[23]),
        params.permanence_increment,
        params.permanence_decrement,
    )?;

    assert_close(segment.synapse(synapse).map(|s| s.permanence), 0.2);
    Ok(())
}

#[test]
fn active_sources_rise_and_inactive_sources_fall() -> Result<()> {
    let conns = Connections::default();
    let mut segment = conns.create_distal_segment(CellIdx(0));
    segment.add_synapse(&conns, CellIdx(23), 0.5)?;
    segment.add_synapse(&conns, CellIdx(37), 0.6)?;
    segment.add_synapse(&conns, CellIdx(477), 0.9)?;

    adapt_segment(&conns, &mut segment, &cells(&[23, 37]), 0.1, 0.1)?;

    assert_close(segment.permanence(CellIdx(23)), 0.6);
    assert_close(segment.permanence(CellIdx(37)), 0.7);
    assert_close(segment.permanence(CellIdx(477)), 0.8);
    Ok(())
}

#[test]
fn over_range_creation_permanence_is_clipped_by_first_pass() -> Result<()> {
    let conns = Connections::default();
    let mut segment = conns.create_distal_segment(CellIdx(0));
    segment.add_synapse(&conns, CellIdx(23), 2.5)?;
    segment.add_synapse(&conns, CellIdx(37), 2.5)?;

    adapt_segment(&conns, &mut segment, &cells(&[23]), 0.1, 0.1)?;

    assert_eq!(segment.permanence(CellIdx(23)), Some(1.0));
    assert_eq!(segment.permanence(CellIdx(37)), Some(1.0));
    Ok(())
}

#[test]
fn negative_creation_permanence_is_pruned_by_first_pass() -> Result<()> {
    let conns = Connections::default();
    let mut segment = conns.create_distal_segment(CellIdx(0));
    segment.add_synapse(&conns, CellIdx(23), -0.5)?;
    segment.add_synapse(&conns, CellIdx(37), -0.05)?;
    segment.add_synapse(&conns, CellIdx(50), 0.5)?;

    let outcome = adapt_segment(&conns, &mut segment, &cells(&[37]), 0.1, 0.1)?;

    // -0.05 + 0.1 survives, -0.5 - 0.1 clips to zero and is destroyed
    assert_eq!(outcome.pruned_synapses, 1);
    assert_eq!(segment.permanence(CellIdx(23)), None);
    assert!((segment.permanence(CellIdx(37)).unwrap_or_default() - 0.05).abs() < 1e-12);
    Ok(())
}

#[test]
fn decayed_synapse_is_removed() -> Result<()> {
    let conns = Connections::default();
    let mut segment = conns.create_distal_segment(CellIdx(0));
    segment.add_synapse(&conns, CellIdx(23), 0.5)?;
    segment.add_synapse(&conns, CellIdx(477), 0.08)?;

    adapt_segment(&conns, &mut segment, &cells(&[23]), 0.1, 0.1)?;

    assert_eq!(segment.permanence(CellIdx(477)), None);
    assert_eq!(segment.len(), 1);
    assert_eq!(conns.num_synapses(), 1);
    Ok(())
}

#[test]
fn capacity_is_enforced_at_the_maximum() -> Result<()> {
    let conns = Connections::default();
    let max = conns.params().max_synapses_per_segment;
    assert_eq!(max, 225);

    let mut segment = conns.create_distal_segment(CellIdx(0));
    for cell in 0..max {
        segment.add_synapse(&conns, CellIdx(cell + 1), 0.5)?;
    }

    assert_eq!(
        segment.add_synapse(&conns, CellIdx(10_000), 0.5),
        Err(HtmError::Capacity {
            segment: segment.ordinal(),
            max
        })
    );
    assert_eq!(segment.len(), max);
    assert_eq!(conns.num_synapses(), max);
    Ok(())
}

#[test]
fn configured_capacity_applies_to_new_segments() -> Result<()> {
    let conns = Connections::new(ConnectionsParams {
        max_synapses_per_segment: 2,
        ..Default::default()
    })?;
    let mut tm = TemporalMemory::new(8, 4, TemporalMemoryParams::default())?;
    let segment = tm.create_segment(&conns, CellIdx(3))?;
    tm.create_synapse(&conns, segment, CellIdx(10), 0.3)?;
    tm.create_synapse(&conns, segment, CellIdx(11), 0.3)?;

    assert!(matches!(
        tm.create_synapse(&conns, segment, CellIdx(12), 0.3),
        Err(HtmError::Capacity { max: 2, .. })
    ));
    Ok(())
}

#[test]
fn depleted_segment_releases_all_its_synapses() -> Result<()> {
    let conns = Connections::default();
    let mut tm = TemporalMemory::new(8, 4, TemporalMemoryParams::default())?;

    let keep = tm.create_segment(&conns, CellIdx(1))?;
    tm.create_synapse(&conns, keep, CellIdx(2), 0.5)?;

    let doomed = tm.create_segment(&conns, CellIdx(1))?;
    for cell in [3, 4, 5] {
        tm.create_synapse(&conns, doomed, CellIdx(cell), 0.1)?;
    }
    conns.set_active_segments(&[keep, doomed])?;
    conns.set_matching_segments(&[doomed])?;

    let segments_before = conns.num_segments();
    let synapses_before = conns.num_synapses();

    let outcome = tm.adapt_segment(&conns, doomed, &cells(&[]), 0.1, 0.1)?;

    assert!(outcome.destroyed_segment);
    assert_eq!(outcome.pruned_synapses, 3);
    assert_eq!(conns.num_segments(), segments_before - 1);
    assert_eq!(conns.num_synapses(), synapses_before - 3);
    assert_eq!(conns.active_segments(), vec![keep]);
    assert!(conns.matching_segments().is_empty());
    assert!(!conns.contains_segment(doomed));

    // the ordinal is not handed out again
    let fresh = tm.create_segment(&conns, CellIdx(1))?;
    assert_eq!(fresh, doomed + 1);
    Ok(())
}

#[test]
fn adapting_an_unknown_segment_is_an_invalid_reference() -> Result<()> {
    let conns = Connections::default();
    let mut tm = TemporalMemory::new(8, 4, TemporalMemoryParams::default())?;
    assert_eq!(
        tm.adapt_segment(&conns, 42, &cells(&[1]), 0.1, 0.1),
        Err(HtmError::InvalidSegment { segment: 42 })
    );
    Ok(())
}
