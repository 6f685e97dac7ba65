//! Audit and restriction rules.
//!
//! Rules are an ordered list evaluated per column per operation. Value-style
//! rules stamp a value into matching columns (timestamps, user stamps,
//! soft-delete markers); restriction rules suppress a column for a role.
//!
//! ```ignore
//! use sqlchain::rules::{AuditRule, AuditRules, DateTimeKind, OperationTypes};
//!
//! let rules = AuditRules::new()
//!     .with_rule(AuditRule::date_time("CreatedDate", DateTimeKind::Utc, OperationTypes::INSERT))
//!     .with_rule(AuditRule::date_time(
//!         "UpdatedDate",
//!         DateTimeKind::Utc,
//!         OperationTypes::INSERT_OR_UPDATE,
//!     ))
//!     .with_rule(AuditRule::soft_delete("DeletedFlag", true));
//! ```

use crate::argument::{Argument, DataObject};
use crate::error::{ChainError, ChainResult};
use crate::ident::ObjectName;
use crate::value::Value;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

/// A set of operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationTypes(u8);

impl OperationTypes {
    pub const NONE: Self = Self(0);
    pub const INSERT: Self = Self(1);
    pub const UPDATE: Self = Self(1 << 1);
    pub const DELETE: Self = Self(1 << 2);
    pub const SELECT: Self = Self(1 << 3);
    pub const INSERT_OR_UPDATE: Self = Self(1 | 1 << 1);
    pub const ALL: Self = Self(0b1111);

    /// `true` if any kind in `other` is also in `self`.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OperationTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Which clock a [`AuditRule::DateTime`] rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeKind {
    /// `Value::TimestampTz` in UTC
    Utc,
    /// `Value::Timestamp` in the local time zone
    Local,
}

/// Inputs available to a generated rule value.
pub struct RuleContext<'a> {
    pub argument: Option<Argument<'a>>,
    pub user: Option<&'a dyn DataObject>,
    /// The value already bound to the column, if any.
    pub current_value: Option<&'a Value>,
    pub operation: OperationTypes,
}

type ValueGenerator = Arc<dyn Fn(&RuleContext<'_>) -> ChainResult<Value> + Send + Sync>;
type UserPredicate = Arc<dyn Fn(Option<&dyn DataObject>) -> bool + Send + Sync>;

/// Value source for [`AuditRule::Value`].
#[derive(Clone)]
pub enum RuleValue {
    Constant(Value),
    Generated(ValueGenerator),
}

impl fmt::Debug for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            RuleValue::Generated(_) => f.write_str("Generated(<fn>)"),
        }
    }
}

/// One audit or restriction rule.
#[derive(Clone)]
pub enum AuditRule {
    /// Stamp a value into `column`.
    Value {
        column: String,
        applies_to: OperationTypes,
        value: RuleValue,
    },
    /// Stamp the current time into `column`.
    DateTime {
        column: String,
        applies_to: OperationTypes,
        kind: DateTimeKind,
    },
    /// Copy `user_property` from the current user into `column`.
    UserData {
        column: String,
        applies_to: OperationTypes,
        user_property: String,
    },
    /// Deletes set `column` to `deleted_value`; selects exclude rows holding it.
    SoftDelete {
        column: String,
        deleted_value: Value,
        applies_to: OperationTypes,
    },
    /// Suppress `column` for the listed operations unless `except_when` holds
    /// for the current user.
    RestrictColumn {
        object: Option<ObjectName>,
        column: String,
        applies_to: OperationTypes,
        except_when: Option<UserPredicate>,
    },
}

impl AuditRule {
    pub fn value(
        column: impl Into<String>,
        value: impl Into<Value>,
        applies_to: OperationTypes,
    ) -> Self {
        AuditRule::Value {
            column: column.into(),
            applies_to,
            value: RuleValue::Constant(value.into()),
        }
    }

    pub fn generated<F>(column: impl Into<String>, applies_to: OperationTypes, f: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> ChainResult<Value> + Send + Sync + 'static,
    {
        AuditRule::Value {
            column: column.into(),
            applies_to,
            value: RuleValue::Generated(Arc::new(f)),
        }
    }

    pub fn date_time(
        column: impl Into<String>,
        kind: DateTimeKind,
        applies_to: OperationTypes,
    ) -> Self {
        AuditRule::DateTime {
            column: column.into(),
            applies_to,
            kind,
        }
    }

    pub fn user_data(
        column: impl Into<String>,
        user_property: impl Into<String>,
        applies_to: OperationTypes,
    ) -> Self {
        AuditRule::UserData {
            column: column.into(),
            applies_to,
            user_property: user_property.into(),
        }
    }

    /// Soft delete for both deletes and selects.
    pub fn soft_delete(column: impl Into<String>, deleted_value: impl Into<Value>) -> Self {
        AuditRule::SoftDelete {
            column: column.into(),
            deleted_value: deleted_value.into(),
            applies_to: OperationTypes::DELETE | OperationTypes::SELECT,
        }
    }

    pub fn restrict_column(
        object: Option<&str>,
        column: impl Into<String>,
        applies_to: OperationTypes,
    ) -> ChainResult<Self> {
        let object = object.map(ObjectName::parse).transpose()?;
        Ok(AuditRule::RestrictColumn {
            object,
            column: column.into(),
            applies_to,
            except_when: None,
        })
    }

    /// Attach an exemption predicate to a restriction rule. Other rules are
    /// returned unchanged.
    pub fn except_when<F>(self, predicate: F) -> Self
    where
        F: Fn(Option<&dyn DataObject>) -> bool + Send + Sync + 'static,
    {
        match self {
            AuditRule::RestrictColumn {
                object,
                column,
                applies_to,
                ..
            } => AuditRule::RestrictColumn {
                object,
                column,
                applies_to,
                except_when: Some(Arc::new(predicate)),
            },
            other => other,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            AuditRule::Value { column, .. }
            | AuditRule::DateTime { column, .. }
            | AuditRule::UserData { column, .. }
            | AuditRule::SoftDelete { column, .. }
            | AuditRule::RestrictColumn { column, .. } => column,
        }
    }

    pub fn applies_to(&self) -> OperationTypes {
        match self {
            AuditRule::Value { applies_to, .. }
            | AuditRule::DateTime { applies_to, .. }
            | AuditRule::UserData { applies_to, .. }
            | AuditRule::SoftDelete { applies_to, .. }
            | AuditRule::RestrictColumn { applies_to, .. } => *applies_to,
        }
    }

    /// Compute the value this rule stamps, or `None` for rules that never stamp
    /// during `operation`.
    pub(crate) fn generate(&self, ctx: &RuleContext<'_>) -> ChainResult<Option<Value>> {
        if !self.applies_to().intersects(ctx.operation) {
            return Ok(None);
        }
        match self {
            AuditRule::Value { value, .. } => match value {
                RuleValue::Constant(v) => Ok(Some(v.clone())),
                RuleValue::Generated(f) => f(ctx).map(Some),
            },
            AuditRule::DateTime { kind, .. } => Ok(Some(match kind {
                DateTimeKind::Utc => Value::TimestampTz(chrono::Utc::now()),
                DateTimeKind::Local => Value::Timestamp(chrono::Local::now().naive_local()),
            })),
            AuditRule::UserData { user_property, column, .. } => {
                let user = ctx.user.ok_or_else(|| {
                    ChainError::InvalidArgument(format!(
                        "Rule for column {column} requires a user, but none was set on the data source"
                    ))
                })?;
                let property = user
                    .properties()
                    .into_iter()
                    .find(|p| p.name.eq_ignore_ascii_case(user_property))
                    .ok_or_else(|| {
                        ChainError::mapping(
                            "user",
                            format!("The user object has no property named {user_property}"),
                        )
                    })?;
                Ok(Some(property.value))
            }
            // Soft deletes only stamp during deletes; the select side is a filter.
            AuditRule::SoftDelete { deleted_value, .. } => Ok(ctx
                .operation
                .intersects(OperationTypes::DELETE)
                .then(|| deleted_value.clone())),
            AuditRule::RestrictColumn { .. } => Ok(None),
        }
    }
}

impl fmt::Debug for AuditRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditRule::Value { column, applies_to, value } => f
                .debug_struct("Value")
                .field("column", column)
                .field("applies_to", applies_to)
                .field("value", value)
                .finish(),
            AuditRule::DateTime { column, applies_to, kind } => f
                .debug_struct("DateTime")
                .field("column", column)
                .field("applies_to", applies_to)
                .field("kind", kind)
                .finish(),
            AuditRule::UserData {
                column,
                applies_to,
                user_property,
            } => f
                .debug_struct("UserData")
                .field("column", column)
                .field("applies_to", applies_to)
                .field("user_property", user_property)
                .finish(),
            AuditRule::SoftDelete {
                column,
                deleted_value,
                applies_to,
            } => f
                .debug_struct("SoftDelete")
                .field("column", column)
                .field("deleted_value", deleted_value)
                .field("applies_to", applies_to)
                .finish(),
            AuditRule::RestrictColumn {
                object,
                column,
                applies_to,
                except_when,
            } => f
                .debug_struct("RestrictColumn")
                .field("object", object)
                .field("column", column)
                .field("applies_to", applies_to)
                .field("has_exception", &except_when.is_some())
                .finish(),
        }
    }
}

/// The rule set and current user of a data source.
#[derive(Clone, Default)]
pub struct AuditRules {
    rules: Vec<AuditRule>,
    user: Option<Arc<dyn DataObject + Send + Sync>>,
}

impl AuditRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: AuditRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Replace the current user. Rules are kept.
    pub fn with_user(mut self, user: Arc<dyn DataObject + Send + Sync>) -> Self {
        self.user = Some(user);
        self
    }

    pub fn user(&self) -> Option<&(dyn DataObject + Send + Sync)> {
        self.user.as_deref()
    }

    pub fn rules(&self) -> &[AuditRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Soft-delete rules that apply to `operation`.
    pub fn soft_delete_rules(&self, operation: OperationTypes) -> impl Iterator<Item = &AuditRule> {
        self.rules
            .iter()
            .filter(move |r| {
                matches!(r, AuditRule::SoftDelete { .. }) && r.applies_to().intersects(operation)
            })
    }

    /// Restriction rules that are active for `object` and the current user.
    pub(crate) fn active_restrictions<'a>(
        &'a self,
        object: &'a ObjectName,
    ) -> impl Iterator<Item = (&'a str, OperationTypes)> + 'a {
        let user = self.user.as_deref().map(|u| u as &dyn DataObject);
        self.rules.iter().filter_map(move |rule| match rule {
            AuditRule::RestrictColumn {
                object: target,
                column,
                applies_to,
                except_when,
            } => {
                if target.as_ref().is_some_and(|t| !t.matches(object)) {
                    return None;
                }
                if except_when.as_ref().is_some_and(|f| f(user)) {
                    return None;
                }
                Some((column.as_str(), *applies_to))
            }
            _ => None,
        })
    }
}

impl fmt::Debug for AuditRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRules")
            .field("rules", &self.rules)
            .field("has_user", &self.user.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_sets() {
        let t = OperationTypes::INSERT_OR_UPDATE;
        assert!(t.contains(OperationTypes::INSERT));
        assert!(t.intersects(OperationTypes::UPDATE));
        assert!(!t.intersects(OperationTypes::DELETE));
        assert_eq!(OperationTypes::INSERT | OperationTypes::UPDATE, t);
        assert!(OperationTypes::ALL.contains(OperationTypes::SELECT));
    }

    #[test]
    fn constant_rule_only_for_listed_operations() {
        let rule = AuditRule::value("Source", "api", OperationTypes::INSERT);
        let ctx = |operation| RuleContext {
            argument: None,
            user: None,
            current_value: None,
            operation,
        };
        assert_eq!(
            rule.generate(&ctx(OperationTypes::INSERT)).unwrap(),
            Some(Value::from("api"))
        );
        assert_eq!(rule.generate(&ctx(OperationTypes::UPDATE)).unwrap(), None);
    }

    #[test]
    fn soft_delete_stamps_only_on_delete() {
        let rule = AuditRule::soft_delete("DeletedFlag", true);
        let ctx = |operation| RuleContext {
            argument: None,
            user: None,
            current_value: None,
            operation,
        };
        assert_eq!(
            rule.generate(&ctx(OperationTypes::DELETE)).unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(rule.generate(&ctx(OperationTypes::SELECT)).unwrap(), None);
    }

    #[test]
    fn user_rule_without_user_fails() {
        let rule = AuditRule::user_data("CreatedBy", "UserKey", OperationTypes::INSERT);
        let ctx = RuleContext {
            argument: None,
            user: None,
            current_value: None,
            operation: OperationTypes::INSERT,
        };
        assert!(matches!(rule.generate(&ctx), Err(ChainError::InvalidArgument(_))));
    }

    #[test]
    fn restriction_exemption() {
        let rules = AuditRules::new().with_rule(
            AuditRule::restrict_column(Some("dbo.Employee"), "Salary", OperationTypes::SELECT)
                .unwrap()
                .except_when(|user| user.is_some()),
        );
        let employee = ObjectName::parse("dbo.Employee").unwrap();
        let other = ObjectName::parse("dbo.Customer").unwrap();
        assert_eq!(rules.active_restrictions(&employee).count(), 1);
        assert_eq!(rules.active_restrictions(&other).count(), 0);
    }
}
