//! The order state machine.
//!
//! Every permitted edge is listed in [`rule`]; anything else is an invalid
//! transition. Who may fire an edge is part of the rule.

use crate::models::order::OrderStatus;

/// What fires a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Assignment,
    Cancellation,
    Pickup,
    Delivery,
}

/// Actors allowed to fire a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowed {
    /// Staff tier only.
    Staff,
    /// The customer who owns the order, or the staff tier.
    OwnerOrStaff,
    /// The driver currently assigned to the order, or a staff override.
    AssignedDriverOrStaff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub trigger: Trigger,
    pub allowed: Allowed,
    /// Whether the assigned driver is released when the edge fires.
    pub releases_driver: bool,
}

const RULES: [TransitionRule; 6] = [
    TransitionRule {
        from: OrderStatus::Pending,
        to: OrderStatus::Processing,
        trigger: Trigger::Assignment,
        allowed: Allowed::Staff,
        releases_driver: false,
    },
    TransitionRule {
        from: OrderStatus::Pending,
        to: OrderStatus::Cancelled,
        trigger: Trigger::Cancellation,
        allowed: Allowed::OwnerOrStaff,
        releases_driver: false,
    },
    TransitionRule {
        from: OrderStatus::Processing,
        to: OrderStatus::PickedUp,
        trigger: Trigger::Pickup,
        allowed: Allowed::AssignedDriverOrStaff,
        releases_driver: false,
    },
    TransitionRule {
        from: OrderStatus::Processing,
        to: OrderStatus::Cancelled,
        trigger: Trigger::Cancellation,
        allowed: Allowed::Staff,
        releases_driver: true,
    },
    TransitionRule {
        from: OrderStatus::PickedUp,
        to: OrderStatus::Delivered,
        trigger: Trigger::Delivery,
        allowed: Allowed::AssignedDriverOrStaff,
        releases_driver: false,
    },
    TransitionRule {
        from: OrderStatus::PickedUp,
        to: OrderStatus::Cancelled,
        trigger: Trigger::Cancellation,
        allowed: Allowed::Staff,
        releases_driver: true,
    },
];

pub fn rule(from: OrderStatus, to: OrderStatus) -> Option<TransitionRule> {
    RULES
        .iter()
        .copied()
        .find(|rule| rule.from == from && rule.to == to)
}

/// Statuses reachable from `from` in one step.
#[cfg(test)]
fn successors(from: OrderStatus) -> Vec<OrderStatus> {
    RULES
        .iter()
        .filter(|rule| rule.from == from)
        .map(|rule| rule.to)
        .collect()
}
