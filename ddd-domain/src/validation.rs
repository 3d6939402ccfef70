//! 校验链（Validator chain）
//!
//! 持久化前对实体执行的业务规则检查：每个校验器返回违规列表（空表示通过），
//! `ValidatorChain` 运行全部校验器并汇总，任一违规即以 `DomainError::Validation`
//! 携带完整列表失败。没有注册任何校验器时校验为空操作。
//!
use crate::error::{DomainError, DomainResult};
use crate::specification::Specification;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// 单条规则违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 针对某一实体类型的校验器，无副作用，可跨工作单元共享
pub trait Validator<T>: Send + Sync {
    fn validate(&self, entity: &T) -> Vec<Violation>;
}

/// 以闭包谓词表达的单条规则
pub struct Rule<T> {
    field: String,
    message: String,
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Rule<T> {
    pub fn new<F>(field: impl Into<String>, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            message: message.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl<T> Validator<T> for Rule<T> {
    fn validate(&self, entity: &T) -> Vec<Violation> {
        if (self.predicate)(entity) {
            vec![]
        } else {
            vec![Violation::new(&self.field, &self.message)]
        }
    }
}

/// 字符串字段长度规则（按字符计数，闭区间）
pub struct LengthRule<T> {
    field: String,
    min: usize,
    max: usize,
    accessor: Box<dyn Fn(&T) -> &str + Send + Sync>,
}

impl<T> LengthRule<T> {
    pub fn new<F>(field: impl Into<String>, min: usize, max: usize, accessor: F) -> Self
    where
        F: Fn(&T) -> &str + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            min,
            max,
            accessor: Box::new(accessor),
        }
    }
}

impl<T> Validator<T> for LengthRule<T> {
    fn validate(&self, entity: &T) -> Vec<Violation> {
        let len = (self.accessor)(entity).chars().count();
        if (self.min..=self.max).contains(&len) {
            return vec![];
        }
        vec![Violation::new(
            &self.field,
            format!(
                "must be between {} and {} characters, got {}",
                self.min, self.max, len
            ),
        )]
    }
}

/// 将任意规约包装为校验器
pub struct SpecificationValidator<T> {
    field: String,
    message: String,
    spec: Arc<dyn Specification<T>>,
}

impl<T> SpecificationValidator<T> {
    pub fn new<S>(field: impl Into<String>, message: impl Into<String>, spec: S) -> Self
    where
        S: Specification<T> + 'static,
    {
        Self {
            field: field.into(),
            message: message.into(),
            spec: Arc::new(spec),
        }
    }
}

impl<T> Validator<T> for SpecificationValidator<T> {
    fn validate(&self, entity: &T) -> Vec<Violation> {
        if self.spec.is_satisfied_by(entity) {
            vec![]
        } else {
            vec![Violation::new(&self.field, &self.message)]
        }
    }
}

/// 某一实体类型的校验器集合，在仓储构建时确定
pub struct ValidatorChain<T> {
    validators: Vec<Arc<dyn Validator<T>>>,
}

impl<T> Default for ValidatorChain<T> {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
        }
    }
}

impl<T> Clone for ValidatorChain<T> {
    fn clone(&self) -> Self {
        Self {
            validators: self.validators.clone(),
        }
    }
}

impl<T> ValidatorChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加校验器（链式）
    pub fn with<V>(mut self, validator: V) -> Self
    where
        V: Validator<T> + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn push(&mut self, validator: Arc<dyn Validator<T>>) {
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// 运行全部校验器并汇总违规
    pub fn violations(&self, entity: &T) -> Vec<Violation> {
        self.validators
            .iter()
            .flat_map(|v| v.validate(entity))
            .collect()
    }

    pub fn validate(&self, entity: &T) -> DomainResult<()> {
        let violations = self.violations(entity);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation { violations })
        }
    }
}

impl<T> FromIterator<Arc<dyn Validator<T>>> for ValidatorChain<T> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Validator<T>>>>(iter: I) -> Self {
        Self {
            validators: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::FnSpecification;

    struct Account {
        name: String,
        email: String,
    }

    fn chain() -> ValidatorChain<Account> {
        ValidatorChain::new()
            .with(LengthRule::new("name", 3, 10, |a: &Account| a.name.as_str()))
            .with(Rule::new("email", "must contain '@'", |a: &Account| {
                a.email.contains('@')
            }))
    }

    #[test]
    fn empty_chain_is_noop() {
        let chain = ValidatorChain::<Account>::new();
        let acc = Account {
            name: String::new(),
            email: String::new(),
        };
        assert!(chain.validate(&acc).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let acc = Account {
            name: "ab".into(),
            email: "nobody".into(),
        };
        let err = chain().validate(&acc).unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].field, "name");
        assert_eq!(violations[1].field, "email");
    }

    #[test]
    fn length_counts_characters() {
        let rule = LengthRule::new("name", 3, 10, |a: &Account| a.name.as_str());
        let acc = Account {
            name: "数据库".into(),
            email: String::new(),
        };
        assert!(rule.validate(&acc).is_empty());
    }

    #[test]
    fn specification_validator() {
        let v: SpecificationValidator<Account> = SpecificationValidator::new(
            "email",
            "must not be empty",
            FnSpecification::new(|a: &Account| !a.email.is_empty()),
        );
        let ok = Account {
            name: "abc".into(),
            email: "a@b".into(),
        };
        let bad = Account {
            name: "abc".into(),
            email: String::new(),
        };
        assert!(v.validate(&ok).is_empty());
        assert_eq!(v.validate(&bad), vec![Violation::new("email", "must not be empty")]);
    }
}
