//! Waste rule table
//!
//! Each rule is independent: a condition over the aggregate, the points it
//! adds, an optional priority tier and a reason. Rules are evaluated in
//! table order and the reasons of a recommendation follow that order.

use crate::models::{Priority, ResourceAggregate};

use super::ScoringConfig;

/// Facts about one aggregate shared by every rule condition
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub aggregate: &'a ResourceAggregate,
    pub avg_usage: f64,
    pub compute_like: bool,
    pub storage_like: bool,
    pub in_primary_zone: bool,
    pub large_instance: bool,
}

impl<'a> RuleContext<'a> {
    pub fn new(aggregate: &'a ResourceAggregate, config: &ScoringConfig) -> Self {
        let service = aggregate.service_type.as_str();
        let contains_any =
            |markers: &[String]| markers.iter().any(|m| service.contains(m.as_str()));

        Self {
            aggregate,
            avg_usage: aggregate.avg_usage(),
            compute_like: contains_any(&config.compute_markers),
            storage_like: contains_any(&config.storage_markers),
            in_primary_zone: aggregate.availability_zone == config.primary_zone,
            large_instance: config
                .large_instance_types
                .iter()
                .any(|t| *t == aggregate.instance_type),
        }
    }
}

/// A rule that fired for an aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub rule: &'static str,
    pub points: u32,
    pub tier: Option<Priority>,
    pub reason: &'static str,
}

/// One entry of the rule table
#[derive(Clone, Copy)]
pub struct WasteRule {
    pub name: &'static str,
    pub points: u32,
    pub tier: Option<Priority>,
    pub reason: &'static str,
    condition: fn(&RuleContext<'_>) -> bool,
}

impl WasteRule {
    pub const fn new(
        name: &'static str,
        points: u32,
        tier: Option<Priority>,
        reason: &'static str,
        condition: fn(&RuleContext<'_>) -> bool,
    ) -> Self {
        Self {
            name,
            points,
            tier,
            reason,
            condition,
        }
    }

    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        (self.condition)(ctx)
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleHit> {
        self.matches(ctx).then_some(RuleHit {
            rule: self.name,
            points: self.points,
            tier: self.tier,
            reason: self.reason,
        })
    }
}

impl std::fmt::Debug for WasteRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasteRule")
            .field("name", &self.name)
            .field("points", &self.points)
            .field("tier", &self.tier)
            .finish()
    }
}

fn critical_low_utilization(ctx: &RuleContext<'_>) -> bool {
    ctx.compute_like && ctx.avg_usage < 5.0
}

fn low_utilization(ctx: &RuleContext<'_>) -> bool {
    ctx.compute_like && (5.0..20.0).contains(&ctx.avg_usage)
}

fn high_storage_cost(ctx: &RuleContext<'_>) -> bool {
    ctx.storage_like && ctx.aggregate.total_cost > 1.0
}

fn moderate_storage_cost(ctx: &RuleContext<'_>) -> bool {
    let cost = ctx.aggregate.total_cost;
    ctx.storage_like && cost > 0.5 && cost <= 1.0
}

fn likely_idle(ctx: &RuleContext<'_>) -> bool {
    ctx.aggregate.record_count == 1 && ctx.aggregate.total_cost > 0.5
}

fn non_primary_location(ctx: &RuleContext<'_>) -> bool {
    !ctx.in_primary_zone
}

fn oversized_instance(ctx: &RuleContext<'_>) -> bool {
    ctx.large_instance && ctx.avg_usage < 50.0
}

fn high_daily_cost(ctx: &RuleContext<'_>) -> bool {
    ctx.aggregate.total_cost > 2.0
}

/// The standard rule table, in evaluation order
pub const DEFAULT_RULES: [WasteRule; 8] = [
    WasteRule::new(
        "critical_low_utilization",
        40,
        Some(Priority::High),
        "Critical: very low compute utilization detected",
        critical_low_utilization,
    ),
    WasteRule::new(
        "low_utilization",
        25,
        Some(Priority::Medium),
        "Low compute utilization - consider downsizing",
        low_utilization,
    ),
    WasteRule::new(
        "high_storage_cost",
        30,
        Some(Priority::High),
        "High storage costs - review utilization",
        high_storage_cost,
    ),
    WasteRule::new(
        "moderate_storage_cost",
        15,
        None,
        "Moderate storage costs - review retention and tiering",
        moderate_storage_cost,
    ),
    WasteRule::new(
        "likely_idle",
        35,
        Some(Priority::High),
        "Single usage record with material cost - resource is likely idle",
        likely_idle,
    ),
    WasteRule::new(
        "non_primary_location",
        10,
        None,
        "Resource runs outside the primary availability zone",
        non_primary_location,
    ),
    WasteRule::new(
        "oversized_instance",
        20,
        None,
        "Large instance type with low average usage - consider a smaller size",
        oversized_instance,
    ),
    WasteRule::new(
        "high_daily_cost",
        25,
        Some(Priority::High),
        "High absolute daily cost",
        high_daily_cost,
    ),
];

pub fn default_rules() -> Vec<WasteRule> {
    DEFAULT_RULES.to_vec()
}
