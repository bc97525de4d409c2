//! Terraform remediation plans
//!
//! Renders an import-then-destroy placeholder block for each recommended
//! EC2 instance or EBS volume. Other services get a manual review note.
//! The output is a starting point for an operator, never applied here.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Priority, RecommendationStatus, WasteRecommendation};

/// Region used when a recommendation's zone does not name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// What Terraform can do about a recommended resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationTarget {
    Instance,
    Volume,
    ManualReview,
}

impl RemediationTarget {
    /// Classify a billing service name
    pub fn for_service(service_type: &str) -> Self {
        let service = service_type.to_ascii_lowercase();
        if service.contains("ebs") || service.contains("elastic block store") {
            RemediationTarget::Volume
        } else if service.contains("ec2") || service.contains("elastic compute cloud") {
            RemediationTarget::Instance
        } else {
            RemediationTarget::ManualReview
        }
    }

    /// Terraform resource type, if one applies
    pub fn resource_type(&self) -> Option<&'static str> {
        match self {
            RemediationTarget::Instance => Some("aws_instance"),
            RemediationTarget::Volume => Some("aws_ebs_volume"),
            RemediationTarget::ManualReview => None,
        }
    }
}

/// Which recommendations a plan covers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    pub min_priority: Priority,
    /// Only recommendations in this state; `None` takes any
    pub status: Option<RecommendationStatus>,
    pub default_region: String,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            min_priority: Priority::High,
            status: None,
            default_region: DEFAULT_REGION.to_string(),
        }
    }
}

/// One rendered resource block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationBlock {
    pub resource_id: String,
    pub target: RemediationTarget,
    pub region: String,
    pub content: String,
}

/// A complete `.tf` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub file_name: String,
    pub blocks: Vec<RemediationBlock>,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

impl RemediationPlan {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks Terraform can act on, excluding manual review notes
    pub fn actionable(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.target != RemediationTarget::ManualReview)
            .count()
    }
}

/// Region of an availability zone, e.g. `ap-south-1a` -> `ap-south-1`
pub fn region_of_zone(zone: &str) -> Option<&str> {
    let region = zone.trim_end_matches(|c: char| c.is_ascii_lowercase());
    let named = region.len() < zone.len() && region.ends_with(|c: char| c.is_ascii_digit());
    named.then_some(region)
}

/// Terraform identifier for a resource id; must not start with a digit
pub fn terraform_name(resource_id: &str) -> String {
    let name: String = resource_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => name,
        _ => format!("r_{}", name),
    }
}

fn provider_alias(region: &str) -> String {
    region.replace('-', "_")
}

/// Render the block for one recommendation
pub fn render_block(rec: &WasteRecommendation, region: &str) -> RemediationBlock {
    let target = RemediationTarget::for_service(&rec.service_type);

    let content = match target.resource_type() {
        Some(resource_type) => {
            let name = terraform_name(&rec.resource_id);
            format!(
                "# {service} {id}: wastage score {score} ({priority}), ~${savings:.2}/month\n\
                 # Run: terraform import {rt}.{name} {id}\n\
                 # Then: terraform destroy -target={rt}.{name}\n\
                 resource \"{rt}\" \"{name}\" {{\n  provider = aws.{alias}\n}}",
                service = rec.service_type,
                id = rec.resource_id,
                score = rec.wastage_score,
                priority = rec.priority,
                savings = rec.estimated_monthly_savings,
                rt = resource_type,
                name = name,
                alias = provider_alias(region),
            )
        }
        None => format!(
            "# Unsupported service type: {}\n# Manual review required for resource: {}",
            rec.service_type, rec.resource_id
        ),
    };

    RemediationBlock {
        resource_id: rec.resource_id.clone(),
        target,
        region: region.to_string(),
        content,
    }
}

/// Build a plan from recommendations, keeping their order
pub fn build_plan(
    recommendations: &[WasteRecommendation],
    config: &RemediationConfig,
    now: DateTime<Utc>,
) -> RemediationPlan {
    let blocks: Vec<RemediationBlock> = recommendations
        .iter()
        .filter(|r| r.priority >= config.min_priority)
        .filter(|r| config.status.map_or(true, |s| r.status == s))
        .map(|r| {
            let region = region_of_zone(&r.availability_zone)
                .unwrap_or(config.default_region.as_str());
            render_block(r, region)
        })
        .collect();

    let regions: BTreeSet<&str> = blocks
        .iter()
        .filter(|b| b.target != RemediationTarget::ManualReview)
        .map(|b| b.region.as_str())
        .collect();

    let mut sections: Vec<String> = regions
        .iter()
        .map(|region| {
            format!(
                "provider \"aws\" {{\n  alias  = \"{}\"\n  region = \"{}\"\n}}",
                provider_alias(region),
                region
            )
        })
        .collect();
    sections.extend(blocks.iter().map(|b| b.content.clone()));

    let mut content = sections.join("\n\n");
    if !content.is_empty() {
        content.push('\n');
    }

    RemediationPlan {
        file_name: format!("terraform-delete-{}.tf", now.format("%Y%m%d-%H%M%S")),
        blocks,
        content,
        generated_at: now,
    }
}
