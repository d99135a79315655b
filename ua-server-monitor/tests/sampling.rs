mod common;

use common::{
    analog_node, attribute_request, create_request, double, fast_limits, init_tracing,
    plain_node, wait_for_queue_len, wait_until, CountingSampler, SlowSampler,
};
use std::{sync::Arc, time::Duration};
use ua_server_monitor::{
    EuRange, MonitorLimits, MonitoredItem, MonitoringMode,
};
use ua_server_types::{
    AttributeId, DataValue, NumericRange, StatusCode, TimestampsToReturn, Variant,
};

/// A periodic item keeps producing readings at roughly its revised
/// interval.
#[tokio::test]
async fn periodic_item_samples_repeatedly() -> anyhow::Result<()> {
    init_tracing();

    let node = analog_node("turbine.rpm", 0.0, 10_000.0, 0.0);
    let sampler = Arc::new(CountingSampler::default());
    let item = MonitoredItem::create(
        create_request(1, &node, Some(20.0), 100, true, None),
        &node,
        fast_limits(),
        Some(sampler.clone()),
    )?;

    item.set_monitoring_mode(MonitoringMode::Reporting);
    wait_for_queue_len(&item, 4).await;

    let notifications = item.extract_notifications();
    assert!(notifications.len() >= 4);
    assert!(notifications.iter().all(|n| n.client_handle == 10));
    assert!(sampler.calls() >= 4);
    Ok(())
}

/// While a sampling callback is in flight no second callback may begin;
/// ticks that land during the callback are skipped, not queued.
#[tokio::test]
async fn sampling_guard_prevents_overlap() -> anyhow::Result<()> {
    init_tracing();

    let node = analog_node("slow.sensor", 0.0, 100.0, 0.0);
    let sampler = Arc::new(SlowSampler::new(Duration::from_millis(100)));
    let item = MonitoredItem::create(
        create_request(2, &node, Some(20.0), 100, true, None),
        &node,
        fast_limits(),
        Some(sampler.clone()),
    )?;

    item.set_monitoring_mode(MonitoringMode::Reporting);
    assert!(
        wait_until(|| sampler.calls() >= 3, Duration::from_secs(5)).await,
        "slow sampler never reached three calls"
    );

    assert_eq!(sampler.max_active(), 1, "sampling callbacks overlapped");
    item.terminate();
    Ok(())
}

/// Exception-based Value items report on change events and stay quiet when
/// the observed reading did not move.
#[tokio::test]
async fn exception_item_reports_only_changes() -> anyhow::Result<()> {
    init_tracing();

    let node = analog_node("silo.weight", 0.0, 1000.0, 10.0);
    let item = MonitoredItem::create(
        create_request(3, &node, Some(0.0), 50, true, None),
        &node,
        MonitorLimits::default(),
        None,
    )?;

    item.set_monitoring_mode(MonitoringMode::Reporting);
    wait_for_queue_len(&item, 1).await;

    node.set_value(double(11.0));
    wait_for_queue_len(&item, 2).await;

    // Same value and status again: only the timestamps move, which the
    // default filter ignores.
    node.set_value(double(11.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(item.queue_len(), 2);
    Ok(())
}

/// Non-Value attribute items are forced to exception-based sampling and
/// report on per-attribute change events.
#[tokio::test]
async fn attribute_item_listens_for_attribute_changes() -> anyhow::Result<()> {
    init_tracing();

    let node = plain_node("unit.description");
    let item = MonitoredItem::create(
        attribute_request(4, &node, AttributeId::Description, 10),
        &node,
        MonitorLimits::default(),
        None,
    )?;
    assert_eq!(
        item.sampling_interval(),
        0.0,
        "non-Value attributes must be exception-based"
    );

    item.set_monitoring_mode(MonitoringMode::Reporting);
    // Initial synchronous read: the attribute was never written, so the
    // unavailable sentinel is reported.
    wait_for_queue_len(&item, 1).await;

    node.set_attribute(
        AttributeId::Description,
        DataValue::new_now(Variant::from("line 4 gas analyser")),
    );
    wait_for_queue_len(&item, 2).await;

    let notifications = item.extract_notifications();
    assert_eq!(notifications[0].value.status, StatusCode::BAD_DATA_UNAVAILABLE);
    assert_eq!(
        notifications[1].value.value,
        Variant::from("line 4 gas analyser")
    );

    // Value changes do not concern an attribute item.
    node.set_value(double(1.0));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(item.queue_len(), 0);
    Ok(())
}

/// An upstream out-of-range write rejection arrives here as an observed
/// reading and passes through with its status intact.
#[tokio::test]
async fn out_of_range_rejection_passes_through() -> anyhow::Result<()> {
    init_tracing();

    let node = analog_node("gauge.pressure", -100.0, 200.0, 0.0);
    node.set_instrument_range(Some(EuRange::new(-100.0, 200.0)));
    let item = MonitoredItem::create(
        create_request(5, &node, Some(0.0), 10, true, None),
        &node,
        MonitorLimits::default(),
        None,
    )?;

    item.set_monitoring_mode(MonitoringMode::Reporting);
    wait_for_queue_len(&item, 1).await;

    assert_eq!(node.write_value(Variant::Double(150.0)), StatusCode::GOOD);
    wait_for_queue_len(&item, 2).await;

    assert_eq!(
        node.write_value(Variant::Double(-1000.0)),
        StatusCode::BAD_OUT_OF_RANGE
    );
    wait_for_queue_len(&item, 3).await;

    let notifications = item.extract_notifications();
    let last = notifications.last().expect("three notifications");
    assert_eq!(last.value.status, StatusCode::BAD_OUT_OF_RANGE);
    assert_eq!(last.value.value, Variant::Double(-1000.0));
    Ok(())
}

/// Readings are narrowed to the monitored index range and writes that miss
/// the range entirely are discarded silently.
#[tokio::test]
async fn index_range_narrows_and_discards() -> anyhow::Result<()> {
    init_tracing();

    fn int_array(values: &[i32]) -> Variant {
        Variant::Array(values.iter().copied().map(Variant::Int32).collect())
    }

    let node = plain_node("phases.current");
    node.set_value(DataValue::new_now(int_array(&[10, 11, 12, 13])));

    let mut request = create_request(6, &node, Some(0.0), 10, true, None);
    request.item_to_monitor.index_range = Some("1:2".parse()?);
    let item = MonitoredItem::create(request, &node, MonitorLimits::default(), None)?;

    item.set_monitoring_mode(MonitoringMode::Reporting);
    wait_for_queue_len(&item, 1).await;

    let notifications = item.extract_notifications();
    assert_eq!(notifications[0].value.value, int_array(&[11, 12]));

    // A write outside the monitored range never reaches the filter.
    item.record_value(
        DataValue::new_now(int_array(&[10, 11, 12, 99])),
        Some(&NumericRange::index(3)),
    );
    assert_eq!(item.queue_len(), 0);

    // An overlapping write is narrowed to the monitored slice.
    item.record_value(
        DataValue::new_now(int_array(&[20, 21, 22, 23])),
        Some(&NumericRange::span(2, 3).expect("valid span")),
    );
    assert_eq!(item.queue_len(), 1);
    let notifications = item.extract_notifications();
    assert_eq!(notifications[0].value.value, int_array(&[21, 22]));
    Ok(())
}

/// Extraction reduces timestamps to what the item was asked to return.
#[tokio::test]
async fn extraction_normalises_timestamps() -> anyhow::Result<()> {
    init_tracing();

    let node = analog_node("ts.check", 0.0, 1.0, 0.5);
    let mut request = create_request(7, &node, Some(0.0), 10, true, None);
    request.timestamps_to_return = Some(TimestampsToReturn::Source);
    let item = MonitoredItem::create(request, &node, MonitorLimits::default(), None)?;

    item.set_monitoring_mode(MonitoringMode::Reporting);
    wait_for_queue_len(&item, 1).await;

    let notifications = item.extract_notifications();
    assert!(notifications[0].value.source_timestamp.is_some());
    assert!(notifications[0].value.server_timestamp.is_none());
    Ok(())
}
