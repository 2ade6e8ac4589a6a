//! AI/commercial segregation rules.
//!
//! Operations are classified into three fixed categories. Commercial
//! operations are deterministic and transactional and never use AI; AI
//! operations are auxiliary and never sit on the critical business path;
//! hybrid operations may use AI only inside declared boundaries.
//!
//! A second, named-context table ([`ContextBoundary`]) lists contexts where AI
//! is explicitly prohibited. Both checks apply independently.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::SegregationViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    AiContentGeneration,
    AiResearch,
    AiSupport,
    AiAnalysis,
    CommercialOrder,
    CommercialPayment,
    CommercialInventory,
    CommercialShipping,
    CommercialPricing,
    HybridNotification,
    HybridReporting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    Ai,
    Commercial,
    Hybrid,
}

impl OperationType {
    pub const ALL: [OperationType; 11] = [
        OperationType::AiContentGeneration,
        OperationType::AiResearch,
        OperationType::AiSupport,
        OperationType::AiAnalysis,
        OperationType::CommercialOrder,
        OperationType::CommercialPayment,
        OperationType::CommercialInventory,
        OperationType::CommercialShipping,
        OperationType::CommercialPricing,
        OperationType::HybridNotification,
        OperationType::HybridReporting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::AiContentGeneration => "ai_content_generation",
            OperationType::AiResearch => "ai_research",
            OperationType::AiSupport => "ai_support",
            OperationType::AiAnalysis => "ai_analysis",
            OperationType::CommercialOrder => "commercial_order",
            OperationType::CommercialPayment => "commercial_payment",
            OperationType::CommercialInventory => "commercial_inventory",
            OperationType::CommercialShipping => "commercial_shipping",
            OperationType::CommercialPricing => "commercial_pricing",
            OperationType::HybridNotification => "hybrid_notification",
            OperationType::HybridReporting => "hybrid_reporting",
        }
    }

    pub fn category(self) -> OperationCategory {
        match self {
            OperationType::AiContentGeneration
            | OperationType::AiResearch
            | OperationType::AiSupport
            | OperationType::AiAnalysis => OperationCategory::Ai,
            OperationType::CommercialOrder
            | OperationType::CommercialPayment
            | OperationType::CommercialInventory
            | OperationType::CommercialShipping
            | OperationType::CommercialPricing => OperationCategory::Commercial,
            OperationType::HybridNotification | OperationType::HybridReporting => {
                OperationCategory::Hybrid
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

/// Per-call flags describing how an operation is being performed.
///
/// Absent flags are `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationContext {
    pub uses_ai: bool,
    pub inputs_validated: bool,
    pub follows_10_laws: bool,
    pub is_critical_path: bool,
    pub ai_boundaries_defined: bool,
}

/// Summary of the fixed operation classification.
#[derive(Debug, Clone, Serialize)]
pub struct SegregationReport {
    pub ai_operations: Vec<&'static str>,
    pub commercial_operations: Vec<&'static str>,
    pub hybrid_operations: Vec<&'static str>,
    pub segregation_enforced: bool,
    pub rule: &'static str,
}

/// Named contexts where AI is allowed or prohibited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBoundary {
    allowed: BTreeSet<String>,
    prohibited: BTreeSet<String>,
}

/// Serializable view of a [`ContextBoundary`].
#[derive(Debug, Clone, Serialize)]
pub struct BoundaryReport {
    pub ai_allowed: Vec<String>,
    pub ai_prohibited: Vec<String>,
    pub enforcement: &'static str,
}

pub const DEFAULT_AI_ALLOWED_CONTEXTS: &[&str] = &[
    "product_description_generation",
    "marketing_content",
    "customer_inquiry_response",
    "inventory_insights",
];

pub const DEFAULT_AI_PROHIBITED_CONTEXTS: &[&str] = &[
    "order_processing",
    "payment_handling",
    "price_calculation",
    "inventory_updates",
    "shipping_confirmation",
    "refund_processing",
];

impl Default for ContextBoundary {
    fn default() -> Self {
        Self::new(
            DEFAULT_AI_ALLOWED_CONTEXTS.iter().copied(),
            DEFAULT_AI_PROHIBITED_CONTEXTS.iter().copied(),
        )
    }
}

impl ContextBoundary {
    pub fn new<A, P, S>(allowed: A, prohibited: P) -> Self
    where
        A: IntoIterator<Item = S>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            prohibited: prohibited.into_iter().map(Into::into).collect(),
        }
    }

    /// Fail when AI is used in a context on the deny list.
    ///
    /// Contexts on neither list are unrestricted by this table.
    pub fn validate(&self, context_name: &str, uses_ai: bool) -> Result<(), SegregationViolation> {
        if uses_ai && self.prohibited.contains(context_name) {
            return Err(SegregationViolation(format!(
                "AI is prohibited in context {context_name}: \
                 commercial operations require deterministic behavior"
            )));
        }
        Ok(())
    }

    pub fn is_ai_allowed(&self, context_name: &str) -> bool {
        self.allowed.contains(context_name)
    }

    pub fn boundaries(&self) -> BoundaryReport {
        BoundaryReport {
            ai_allowed: self.allowed.iter().cloned().collect(),
            ai_prohibited: self.prohibited.iter().cloned().collect(),
            enforcement: "strict",
        }
    }
}

/// Enforces the generic category rules plus a named-context boundary table.
#[derive(Debug, Clone, Default)]
pub struct SegregationEnforcer {
    boundary: ContextBoundary,
}

impl SegregationEnforcer {
    pub fn new(boundary: ContextBoundary) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> &ContextBoundary {
        &self.boundary
    }

    /// Check the category rules for `operation` under `context`.
    pub fn validate_operation(
        operation: OperationType,
        context: &OperationContext,
    ) -> Result<(), SegregationViolation> {
        let name = operation.as_str();
        match operation.category() {
            OperationCategory::Commercial => {
                if context.uses_ai {
                    return Err(SegregationViolation(format!(
                        "commercial operation {name} cannot use AI"
                    )));
                }
                if !context.inputs_validated {
                    return Err(SegregationViolation(format!(
                        "commercial operation {name} requires validated inputs"
                    )));
                }
            }
            OperationCategory::Ai => {
                if !context.follows_10_laws {
                    return Err(SegregationViolation(format!(
                        "AI operation {name} must follow the behavioral laws"
                    )));
                }
                if context.is_critical_path {
                    return Err(SegregationViolation(format!(
                        "AI operation {name} cannot be in the critical business path"
                    )));
                }
            }
            OperationCategory::Hybrid => {
                if context.uses_ai && !context.ai_boundaries_defined {
                    return Err(SegregationViolation(format!(
                        "hybrid operation {name} must define AI boundaries"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Category rules, then the named-context table when a name is given.
    pub fn validate_in_context(
        &self,
        operation: OperationType,
        context: &OperationContext,
        context_name: Option<&str>,
    ) -> Result<(), SegregationViolation> {
        Self::validate_operation(operation, context)?;
        if let Some(name) = context_name {
            self.boundary.validate(name, context.uses_ai)?;
        }
        Ok(())
    }

    pub fn is_ai_operation(operation: OperationType) -> bool {
        operation.category() == OperationCategory::Ai
    }

    pub fn is_commercial_operation(operation: OperationType) -> bool {
        operation.category() == OperationCategory::Commercial
    }

    pub fn is_hybrid_operation(operation: OperationType) -> bool {
        operation.category() == OperationCategory::Hybrid
    }

    pub fn report() -> SegregationReport {
        let names = |belongs: fn(OperationType) -> bool| {
            OperationType::ALL
                .into_iter()
                .filter(|op| belongs(*op))
                .map(OperationType::as_str)
                .collect()
        };
        SegregationReport {
            ai_operations: names(Self::is_ai_operation),
            commercial_operations: names(Self::is_commercial_operation),
            hybrid_operations: names(Self::is_hybrid_operation),
            segregation_enforced: true,
            rule: "AI and commercial operations are strictly segregated",
        }
    }
}
