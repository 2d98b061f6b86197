//! Configuration-driven permission predicate.
//!
//! Used by the standalone token endpoint, where there is no embedding
//! application to supply a predicate. Rules are evaluated in declaration
//! order and the **first matching rule** decides; if none matches, the
//! configured default applies.
//!
//! ```yaml
//! policy:
//!   default: deny
//!   rules:
//!     - feeds: ["public-*", "news"]
//!       actions: [READ]
//!     - feeds: ["private-*"]
//!       allow: false
//! ```

use async_trait::async_trait;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::action::Action;
use super::engine::PermissionPredicate;
use super::path::FeedPath;
use crate::{Error, Result};

/// Outcome when no rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultDecision {
    /// Grant
    Allow,
    /// Refuse
    #[default]
    Deny,
}

/// `policy` configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Decision when no rule matches
    pub default: DefaultDecision,
    /// Ordered rules
    pub rules: Vec<PolicyRuleConfig>,
}

/// A single policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRuleConfig {
    /// Glob patterns over feed ids
    pub feeds: Vec<String>,
    /// Actions the rule applies to
    #[serde(default = "default_actions")]
    pub actions: Vec<Action>,
    /// Whether a match grants or refuses
    #[serde(default = "default_allow")]
    pub allow: bool,
}

fn default_actions() -> Vec<Action> {
    vec![Action::Read]
}

fn default_allow() -> bool {
    true
}

struct CompiledRule {
    feeds: Vec<Pattern>,
    actions: Vec<Action>,
    allow: bool,
}

impl CompiledRule {
    fn matches(&self, action: Action, feed_id: &str) -> bool {
        self.actions.contains(&action) && self.feeds.iter().any(|p| p.matches(feed_id))
    }
}

/// Glob-based policy over feed ids.
pub struct PolicyPredicate {
    rules: Vec<CompiledRule>,
    default: DefaultDecision,
}

impl PolicyPredicate {
    /// Compile the configured rules.
    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                let feeds = rule
                    .feeds
                    .iter()
                    .map(|p| {
                        Pattern::new(p).map_err(|e| {
                            Error::Config(format!("invalid policy feed pattern {p:?}: {e}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledRule {
                    feeds,
                    actions: rule.actions.clone(),
                    allow: rule.allow,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            default: config.default,
        })
    }

    /// Evaluate the policy for `action` on `resource` (a path or a feed id).
    #[must_use]
    pub fn evaluate(&self, action: Action, resource: &str) -> bool {
        let feed_id = FeedPath::parse(resource)
            .map(|p| p.feed_id().to_string())
            .unwrap_or_else(|_| resource.to_string());

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matches(action, &feed_id) {
                debug!(rule = index, feed_id = %feed_id, allow = rule.allow, "Policy rule matched");
                return rule.allow;
            }
        }

        debug!(feed_id = %feed_id, default = ?self.default, "No policy rule matched");
        self.default == DefaultDecision::Allow
    }
}

#[async_trait]
impl PermissionPredicate for PolicyPredicate {
    async fn has_permission(&self, action: Action, resource: &str) -> anyhow::Result<bool> {
        Ok(self.evaluate(action, resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(yaml: &str) -> PolicyPredicate {
        let config: PolicyConfig = serde_yaml::from_str(yaml).unwrap();
        PolicyPredicate::from_config(&config).unwrap()
    }

    #[test]
    fn first_match_wins() {
        let p = policy(
            r#"
rules:
  - feeds: ["private-*"]
    allow: false
  - feeds: ["*"]
"#,
        );
        assert!(!p.evaluate(Action::Read, "private-42"));
        assert!(p.evaluate(Action::Read, "public"));
    }

    #[test]
    fn accepts_paths_and_feed_ids() {
        let p = policy("rules:\n  - feeds: [\"public-*\"]\n");
        assert!(p.evaluate(Action::Read, "feeds/public-1/items"));
        assert!(p.evaluate(Action::Read, "public-1"));
        assert!(!p.evaluate(Action::Read, "feeds/other/items"));
    }

    #[test]
    fn actions_restrict_rules() {
        let p = policy("rules:\n  - feeds: [\"*\"]\n    actions: [WRITE]\n");
        assert!(!p.evaluate(Action::Read, "anything"));
        assert!(p.evaluate(Action::Write, "anything"));
    }

    #[test]
    fn default_decision_applies() {
        assert!(!policy("{}").evaluate(Action::Read, "x"));
        assert!(policy("default: allow").evaluate(Action::Read, "x"));
    }

    #[test]
    fn invalid_pattern_is_configuration_error() {
        let config = PolicyConfig {
            rules: vec![PolicyRuleConfig {
                feeds: vec!["[".to_string()],
                actions: default_actions(),
                allow: true,
            }],
            ..Default::default()
        };
        assert!(matches!(
            PolicyPredicate::from_config(&config),
            Err(Error::Config(_))
        ));
    }
}
