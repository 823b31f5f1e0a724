//! Rule-based message routing.
//!
//! An ordered list of [`RoutingRule`]s is evaluated against each incoming
//! message; the first rule whose filter matches (scanning by descending
//! rule priority) decides the recipients. A message no rule claims falls
//! through to plain direct delivery.

use hive_core::types::{Priority, Recipient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// What the router needs to know about a message before delivery.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub sender: String,
    pub recipient: Recipient,
    pub subject: Option<String>,
    pub priority: Priority,
}

/// The slice of agent state routing cares about.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub agent_id: String,
    pub capabilities: Vec<String>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFilter {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub subject_contains: Option<String>,
    #[serde(default)]
    pub min_priority: Option<Priority>,
}

impl MessageFilter {
    pub fn matches(&self, request: &RouteRequest) -> bool {
        if let Some(sender) = &self.sender {
            if *sender != request.sender {
                return false;
            }
        }
        if let Some(needle) = &self.subject_contains {
            let Some(subject) = &request.subject else {
                return false;
            };
            if !subject.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if request.priority < min {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteStrategy {
    /// Deliver to the recipient named on the message.
    Direct,
    /// Fan out to every known agent except the sender.
    Broadcast,
    /// Redirect to a fixed recipient (e.g. a supervisor on high priority).
    Escalate { to: String },
    /// Rotate through a fixed pool, one recipient per message.
    RoundRobin { pool: Vec<String> },
    /// Deliver to every agent advertising a capability.
    CapabilityMatch { capability: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    /// Higher wins; ties break by list order.
    pub priority: i32,
    #[serde(default)]
    pub filter: MessageFilter,
    pub strategy: RouteStrategy,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    rules: Vec<RoutingRule>,
    /// Per-rule round-robin position, in-process only.
    cursors: Mutex<HashMap<String, usize>>,
}

impl Router {
    pub fn new(mut rules: Vec<RoutingRule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self {
            rules,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Load rules from a YAML file. A missing file means no rules, which
    /// leaves every message on the direct-delivery default.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::new(Vec::new()));
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| crate::InboxError::Routing(format!("read {}: {e}", path.display())))?;
        let rules: Vec<RoutingRule> = serde_yaml::from_str(&data)
            .map_err(|e| crate::InboxError::Routing(format!("parse {}: {e}", path.display())))?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Resolve the concrete recipients for a message.
    pub fn route(&self, request: &RouteRequest, agents: &[AgentProfile]) -> Vec<String> {
        for rule in &self.rules {
            if rule.filter.matches(request) {
                return self.apply(rule, request, agents);
            }
        }
        self.direct(request, agents)
    }

    fn apply(
        &self,
        rule: &RoutingRule,
        request: &RouteRequest,
        agents: &[AgentProfile],
    ) -> Vec<String> {
        match &rule.strategy {
            RouteStrategy::Direct => self.direct(request, agents),
            RouteStrategy::Broadcast => self.everyone_but_sender(request, agents),
            RouteStrategy::Escalate { to } => vec![to.clone()],
            RouteStrategy::RoundRobin { pool } => {
                if pool.is_empty() {
                    return Vec::new();
                }
                let mut cursors = self.cursors.lock().expect("cursor lock poisoned");
                let cursor = cursors.entry(rule.name.clone()).or_insert(0);
                let picked = pool[*cursor % pool.len()].clone();
                *cursor += 1;
                vec![picked]
            }
            RouteStrategy::CapabilityMatch { capability } => agents
                .iter()
                .filter(|a| a.capabilities.iter().any(|c| c == capability))
                .map(|a| a.agent_id.clone())
                .collect(),
        }
    }

    fn direct(&self, request: &RouteRequest, agents: &[AgentProfile]) -> Vec<String> {
        match &request.recipient {
            Recipient::Direct(id) => vec![id.clone()],
            Recipient::Broadcast => self.everyone_but_sender(request, agents),
        }
    }

    fn everyone_but_sender(&self, request: &RouteRequest, agents: &[AgentProfile]) -> Vec<String> {
        agents
            .iter()
            .filter(|a| a.agent_id != request.sender)
            .map(|a| a.agent_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<AgentProfile> {
        vec![
            AgentProfile {
                agent_id: "backend-api".into(),
                capabilities: vec!["deploy".into(), "rust".into()],
            },
            AgentProfile {
                agent_id: "testing".into(),
                capabilities: vec!["qa".into()],
            },
            AgentProfile {
                agent_id: "supervisor".into(),
                capabilities: vec![],
            },
        ]
    }

    fn request(sender: &str, recipient: Recipient, priority: Priority) -> RouteRequest {
        RouteRequest {
            sender: sender.into(),
            recipient,
            subject: None,
            priority,
        }
    }

    #[test]
    fn no_rules_defaults_to_direct() {
        let router = Router::new(vec![]);
        let routed = router.route(
            &request("a", Recipient::Direct("testing".into()), Priority::Low),
            &agents(),
        );
        assert_eq!(routed, vec!["testing".to_string()]);
    }

    #[test]
    fn broadcast_excludes_sender() {
        let router = Router::new(vec![]);
        let routed = router.route(
            &request("supervisor", Recipient::Broadcast, Priority::Low),
            &agents(),
        );
        assert_eq!(routed, vec!["backend-api".to_string(), "testing".to_string()]);
    }

    #[test]
    fn highest_priority_matching_rule_wins() {
        let router = Router::new(vec![
            RoutingRule {
                name: "catch-all".into(),
                priority: 1,
                filter: MessageFilter::default(),
                strategy: RouteStrategy::Broadcast,
            },
            RoutingRule {
                name: "escalate-critical".into(),
                priority: 10,
                filter: MessageFilter {
                    min_priority: Some(Priority::Critical),
                    ..Default::default()
                },
                strategy: RouteStrategy::Escalate {
                    to: "supervisor".into(),
                },
            },
        ]);

        let routed = router.route(
            &request("a", Recipient::Direct("testing".into()), Priority::Critical),
            &agents(),
        );
        assert_eq!(routed, vec!["supervisor".to_string()]);

        // Below critical, the catch-all broadcasts instead.
        let routed = router.route(
            &request("a", Recipient::Direct("testing".into()), Priority::Low),
            &agents(),
        );
        assert_eq!(routed.len(), 2);
    }

    #[test]
    fn round_robin_rotates_through_pool() {
        let router = Router::new(vec![RoutingRule {
            name: "rr".into(),
            priority: 5,
            filter: MessageFilter::default(),
            strategy: RouteStrategy::RoundRobin {
                pool: vec!["x".into(), "y".into()],
            },
        }]);
        let req = request("a", Recipient::Direct("ignored".into()), Priority::Low);
        assert_eq!(router.route(&req, &agents()), vec!["x".to_string()]);
        assert_eq!(router.route(&req, &agents()), vec!["y".to_string()]);
        assert_eq!(router.route(&req, &agents()), vec!["x".to_string()]);
    }

    #[test]
    fn capability_match_selects_advertising_agents() {
        let router = Router::new(vec![RoutingRule {
            name: "deployers".into(),
            priority: 5,
            filter: MessageFilter {
                subject_contains: Some("deploy".into()),
                ..Default::default()
            },
            strategy: RouteStrategy::CapabilityMatch {
                capability: "deploy".into(),
            },
        }]);
        let mut req = request("supervisor", Recipient::Broadcast, Priority::Medium);
        req.subject = Some("deploy v2".into());
        assert_eq!(router.route(&req, &agents()), vec!["backend-api".to_string()]);
    }

    #[test]
    fn filter_on_sender_and_subject() {
        let filter = MessageFilter {
            sender: Some("supervisor".into()),
            subject_contains: Some("urgent".into()),
            min_priority: None,
        };
        let mut req = request("supervisor", Recipient::Broadcast, Priority::Low);
        assert!(!filter.matches(&req));
        req.subject = Some("urgent: rollback".into());
        assert!(filter.matches(&req));
        req.sender = "other".into();
        assert!(!filter.matches(&req));
    }

    #[test]
    fn rules_load_from_yaml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("routing.yaml");
        std::fs::write(
            &path,
            "- name: escalate-critical\n  priority: 10\n  filter:\n    min_priority: critical\n  strategy:\n    kind: escalate\n    to: supervisor\n",
        )
        .unwrap();
        let router = Router::from_file(&path).unwrap();
        assert_eq!(router.rules().len(), 1);
        assert_eq!(router.rules()[0].name, "escalate-critical");
    }

    #[test]
    fn missing_rules_file_yields_empty_router() {
        let dir = tempfile::TempDir::new().unwrap();
        let router = Router::from_file(&dir.path().join("routing.yaml")).unwrap();
        assert!(router.rules().is_empty());
    }

    #[test]
    fn empty_round_robin_pool_routes_nowhere() {
        let router = Router::new(vec![RoutingRule {
            name: "rr".into(),
            priority: 5,
            filter: MessageFilter::default(),
            strategy: RouteStrategy::RoundRobin { pool: vec![] },
        }]);
        let req = request("a", Recipient::Direct("b".into()), Priority::Low);
        assert!(router.route(&req, &agents()).is_empty());
    }
}
