//! Per-resource usage aggregation

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{ResourceAggregate, UsageRecord};

/// Aggregates keyed by resource id, iterated in first-discovery order
#[derive(Debug, Clone, Default)]
pub struct ResourceAggregates {
    index: HashMap<String, usize>,
    entries: Vec<ResourceAggregate>,
    dropped_records: usize,
}

impl ResourceAggregates {
    pub fn get(&self, resource_id: &str) -> Option<&ResourceAggregate> {
        self.index.get(resource_id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceAggregate> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records dropped because they carried neither usage nor cost
    pub fn dropped_records(&self) -> usize {
        self.dropped_records
    }
}

impl<'a> IntoIterator for &'a ResourceAggregates {
    type Item = &'a ResourceAggregate;
    type IntoIter = std::slice::Iter<'a, ResourceAggregate>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Single-pass builder for [`ResourceAggregates`]
#[derive(Debug, Default)]
pub struct UsageAggregator {
    index: HashMap<String, usize>,
    entries: Vec<ResourceAggregate>,
    last_seen: Vec<DateTime<Utc>>,
    dropped_records: usize,
}

impl UsageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record in; returns false if it was dropped as empty
    pub fn add(&mut self, record: &UsageRecord) -> bool {
        if record.is_empty_signal() {
            self.dropped_records += 1;
            return false;
        }

        match self.index.get(&record.resource_id).copied() {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.total_cost += record.cost;
                entry.total_usage += record.usage_amount;
                entry.record_count += 1;

                // Descriptive attributes follow the most recent observation
                if record.timestamp >= self.last_seen[i] {
                    entry.service_type.clone_from(&record.service_type);
                    entry.instance_type.clone_from(&record.instance_type);
                    entry.availability_zone.clone_from(&record.availability_zone);
                    self.last_seen[i] = record.timestamp;
                }
            }
            None => {
                self.index
                    .insert(record.resource_id.clone(), self.entries.len());
                self.entries.push(ResourceAggregate {
                    resource_id: record.resource_id.clone(),
                    service_type: record.service_type.clone(),
                    instance_type: record.instance_type.clone(),
                    availability_zone: record.availability_zone.clone(),
                    total_cost: record.cost,
                    total_usage: record.usage_amount,
                    record_count: 1,
                });
                self.last_seen.push(record.timestamp);
            }
        }

        true
    }

    pub fn finish(self) -> ResourceAggregates {
        ResourceAggregates {
            index: self.index,
            entries: self.entries,
            dropped_records: self.dropped_records,
        }
    }
}

/// Collapse usage records into one aggregate per resource
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> ResourceAggregates {
    let mut aggregator = UsageAggregator::new();
    for record in records {
        aggregator.add(record);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 22, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_sums_and_counts_per_resource() {
        let records = vec![
            UsageRecord::new("i-1", "EC2", 2.0, 0.10),
            UsageRecord::new("i-2", "EBS", 5.0, 0.40),
            UsageRecord::new("i-1", "EC2", 3.0, 0.15),
        ];

        let aggregates = aggregate(&records);

        assert_eq!(aggregates.len(), 2);
        let i1 = aggregates.get("i-1").unwrap();
        assert_eq!(i1.record_count, 2);
        assert!((i1.total_cost - 0.25).abs() < 1e-9);
        assert!((i1.total_usage - 5.0).abs() < 1e-9);
        assert!((i1.avg_usage() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_discovery_order_is_preserved() {
        let records = vec![
            UsageRecord::new("c", "EC2", 1.0, 1.0),
            UsageRecord::new("a", "EC2", 1.0, 1.0),
            UsageRecord::new("b", "EC2", 1.0, 1.0),
            UsageRecord::new("a", "EC2", 1.0, 1.0),
        ];

        let ids: Vec<_> = aggregate(&records)
            .iter()
            .map(|a| a.resource_id.clone())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_zero_usage_and_cost_records_dropped() {
        let records = vec![
            UsageRecord::new("i-1", "EC2", 0.0, 0.0),
            UsageRecord::new("i-2", "EC2", 0.0, 0.2),
        ];

        let aggregates = aggregate(&records);
        assert!(aggregates.get("i-1").is_none());
        assert!(aggregates.get("i-2").is_some());
        assert_eq!(aggregates.dropped_records(), 1);
    }

    #[test]
    fn test_attributes_follow_latest_timestamp() {
        let records = vec![
            UsageRecord::new("i-1", "EC2", 1.0, 0.1)
                .with_zone("ap-south-1b")
                .with_timestamp(at(10)),
            UsageRecord::new("i-1", "EC2", 1.0, 0.1)
                .with_zone("ap-south-1c")
                .with_timestamp(at(8)),
        ];

        let aggregates = aggregate(&records);
        let agg = aggregates.get("i-1").unwrap();
        assert_eq!(agg.availability_zone, "ap-south-1b");
        assert_eq!(agg.record_count, 2);
    }

    #[test]
    fn test_equal_timestamps_prefer_later_record() {
        let records = vec![
            UsageRecord::new("i-1", "EC2", 1.0, 0.1)
                .with_instance_type("t3.micro")
                .with_timestamp(at(9)),
            UsageRecord::new("i-1", "EC2", 1.0, 0.1)
                .with_instance_type("m5.large")
                .with_timestamp(at(9)),
        ];

        let aggregates = aggregate(&records);
        assert_eq!(aggregates.get("i-1").unwrap().instance_type, "m5.large");
    }
}
