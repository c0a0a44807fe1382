//! Per-VRF routing state management
//!
//! Default-route and FIB-rule managers. Installs fail fast; removals are
//! best-effort so teardown stays idempotent.

use crate::gateway::{Direction, Family};

pub mod default_route;
pub mod rules;

pub use default_route::{DefaultRouteManager, DefaultRouteStatus};
pub use rules::FibRuleManager;

/// Metric for the unreachable defaults: worse than any real default route
/// (IPv6 static defaults use 1024) so genuine routes always win
pub const DEFAULT_ROUTE_METRIC: u32 = 8192;

/// Priority of per-VRF oif/iif rules
pub const VRF_RULE_PRIORITY: u32 = 200;

/// Every per-VRF rule shape, in install order
pub const RULE_SHAPES: [(Direction, Family); 4] = [
    (Direction::Output, Family::V4),
    (Direction::Input, Family::V4),
    (Direction::Output, Family::V6),
    (Direction::Input, Family::V6),
];
